use thiserror::Error;

use crate::config::ConfigError;
use crate::descriptor::DescriptorError;
use crate::synthesizer::SynthesisError;
use crate::timestamp::TimeError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),
    // the sandbox zone, when the evaluator is built
    #[error("Time error: {0}")]
    Time(#[from] TimeError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type InternalResult<T> = Result<T, Error>;

impl Error {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Error::Internal(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::eval::Evaluator;
    use crate::timestamp::parse_zone;

    fn surface<T, E>(result: Result<T, E>) -> InternalResult<T>
    where
        Error: From<E>,
    {
        Ok(result?)
    }

    #[test]
    fn test_module_errors_convert() {
        let config = EngineConfig::from_str(r#"{"sandbox": {"max_steps": 0}}"#);
        assert!(matches!(surface(config), Err(Error::Config(_))));
        assert!(matches!(surface(parse_zone("Nowhere/Land")), Err(Error::Time(_))));

        let mut sandbox = EngineConfig::default().sandbox;
        sandbox.time_zone = Some("Nowhere/Land".to_string());
        assert!(matches!(surface(Evaluator::new(&sandbox)), Err(Error::Time(_))));

        assert_eq!(Error::internal("boom").to_string(), "Internal error: boom");
    }
}
