use crate::engine::EngineSettings;
use crate::Args;
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub engine: EngineSettings,
    pub lazy_engine: bool,
    pub max_file_size: usize,
    pub max_request_size: usize,
    pub model_dir: Option<PathBuf>,
    pub pdfium_lib_dir: Option<PathBuf>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let languages = args
            .languages
            .into_iter()
            .map(|lang| lang.trim().to_string())
            .filter(|lang| !lang.is_empty())
            .collect();

        Self {
            host: args.host,
            port: args.port,
            engine: EngineSettings {
                languages,
                use_accelerator: args.use_accelerator,
            },
            lazy_engine: args.lazy_engine,
            max_file_size: args.max_file_size,
            max_request_size: args.max_request_size,
            model_dir: args.model_dir.map(PathBuf::from),
            pdfium_lib_dir: args.pdfium_lib_dir.map(PathBuf::from),
        }
    }
}
