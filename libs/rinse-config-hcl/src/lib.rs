use rinse_engine::config::{ConfigParser, RinseConfig};
use rinse_engine::error::EngineError;

pub struct HclParser;

impl ConfigParser for HclParser {
    fn extensions(&self) -> &[&str] {
        &["hcl"]
    }

    fn parse(&self, content: &str) -> Result<RinseConfig, EngineError> {
        hcl::from_str(content).map_err(|e| EngineError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batch_and_fields() {
        let config = HclParser
            .parse(
                r#"
                batch = {
                  batch_size = 50
                  parallel   = true
                }

                fields = [
                  { source = "ID", target = "id" },
                  { source = "BODY", large_object = true },
                ]
                "#,
            )
            .unwrap();

        assert_eq!(config.batch.batch_size, 50);
        assert!(config.batch.parallel);
        assert_eq!(config.extract.max_depth, 128);
        assert_eq!(config.large_fields(), vec!["BODY"]);
        assert_eq!(config.mapping().target_of("BODY"), Some("body"));
        config.validate().unwrap();
    }

    #[test]
    fn syntax_error_is_a_config_error() {
        let err = HclParser.parse("batch = {").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
