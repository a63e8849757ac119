use config::{Config, ConfigError, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load<'a, T: Serialize + Deserialize<'a>>(file_path: PathBuf) -> Result<T, ConfigError> {
        if let Some(ext) = file_path.extension() {
            let file_format = match ext.to_str() {
                Some("yaml") => Ok(FileFormat::Yaml),
                Some("yml") => Ok(FileFormat::Yaml),
                Some("json") => Ok(FileFormat::Json),
                Some("toml") => Ok(FileFormat::Toml),
                Some("ron") => Ok(FileFormat::Ron),
                _ => Err(ConfigError::NotFound(format!(
                    "File format not supported. File needs to end with .yaml, .json, .toml or .ron. {file_path:?}"
                ))),
            }?;

            let config_str =
                fs::read_to_string(&file_path).expect("Could not read config file to string.");

            // this interprets anything after a $ (within certain rules) as an environment variable
            // and it will look in the environment to find it.
            // Therefore all $ symbols must be escaped with a backslash: \$
            let config_str_with_env_vars = shellexpand::env(&config_str)
                .expect("Shell expansion of config file failed. Environment variables not found?");

            let config = Config::builder()
                .add_source(File::from_str(&config_str_with_env_vars, file_format))
                .build()?;

            let settings_struct: T = config.try_deserialize()?;
            Ok(settings_struct)
        } else {
            Err(ConfigError::NotFound(format!(
                "Could not find file extension on path {file_path:?}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use std::fs::File as StdFile;
    use std::io::Write;
    use std::str::FromStr;
    use tempfile::tempdir;

    #[test]
    fn loads_from_each_supported_format() {
        let dir = tempdir().unwrap();
        for (ext, body) in [
            ("yaml", "db_path: data/ctx.redb\nloader_chunk_size: 42\n"),
            ("toml", "db_path = \"data/ctx.redb\"\nloader_chunk_size = 42\n"),
            ("json", r#"{"db_path": "data/ctx.redb", "loader_chunk_size": 42}"#),
            (
                "ron",
                "(db_path: \"data/ctx.redb\", loader_chunk_size: 42)",
            ),
        ] {
            let file_path = dir.path().join(format!("config.{ext}"));
            let mut file = StdFile::create(&file_path).unwrap();
            file.write_all(body.as_bytes()).unwrap();
            let config: EngineConfig = ConfigLoader::load(file_path).unwrap();
            assert_eq!(config.loader_chunk_size, 42);
        }
    }

    #[test]
    fn rejects_unsupported_extension() {
        let file_path = PathBuf::from_str("test/path/config.exe").unwrap();
        let err: Result<EngineConfig, _> = ConfigLoader::load(file_path);
        assert!(err.is_err());
    }
}
