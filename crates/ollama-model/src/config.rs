/// Builder for [`OllamaConfig`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OllamaConfigBuilder {
    model: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
}

impl OllamaConfigBuilder {
    /// Creates a builder with the given model name, e.g. `mistral`.
    #[inline]
    pub fn with_model<S: Into<String>>(model: S) -> Self {
        Self {
            model: Some(model.into()),
            ..Default::default()
        }
    }

    /// Sets a custom server URL, the default is `http://localhost:11434`.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the sampling temperature. Leave it unset to use the model's
    /// own default.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> OllamaConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        OllamaConfig {
            model: self.model.unwrap_or_else(|| "mistral".to_string()),
            base_url: base_url.trim_end_matches('/').to_owned(),
            temperature: self.temperature,
        }
    }
}

/// Configuration for the Ollama provider.
#[derive(Clone, Debug, PartialEq)]
pub struct OllamaConfig {
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) temperature: Option<f32>,
}

impl OllamaConfig {
    /// Returns the model name.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the server URL, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OllamaConfigBuilder::default().build();
        assert_eq!(config.model(), "mistral");
        assert_eq!(config.base_url(), "http://localhost:11434");
        assert_eq!(config.temperature, None);

        let config = OllamaConfigBuilder::with_model("llava")
            .with_base_url("http://gpu-box:11434/")
            .with_temperature(0.0)
            .build();
        assert_eq!(config.model(), "llava");
        assert_eq!(config.base_url(), "http://gpu-box:11434");
        assert_eq!(config.temperature, Some(0.0));
    }
}
