use crate::error::AppError;

/// Ordered class-index to label lookup, immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Builds the table from a Hugging Face `config.json` (`id2label` field).
    pub fn from_config_json(content: &str) -> Result<Self, AppError> {
        let config: serde_json::Value = serde_json::from_str(content)
            .map_err(|e| AppError::new(format!("Failed to parse config JSON: {}", e)))?;

        let id2label = config["id2label"]
            .as_object()
            .ok_or_else(|| AppError::new("Config missing id2label field"))?;

        let entries: Vec<(usize, String)> = id2label
            .iter()
            .map(|(k, v)| {
                let idx = k
                    .parse::<usize>()
                    .map_err(|_| AppError::new(format!("Invalid label index '{}'", k)))?;
                let label = v.as_str().unwrap_or("unknown").to_string();
                Ok((idx, label))
            })
            .collect::<Result<_, AppError>>()?;

        // Each label stays at its own index; gaps get the `class_<idx>` name.
        let size = entries.iter().map(|(idx, _)| idx + 1).max().unwrap_or(0);
        let mut labels: Vec<String> = (0..size).map(|idx| format!("class_{}", idx)).collect();
        for (idx, label) in entries {
            labels[idx] = label;
        }
        Ok(Self::new(labels))
    }

    /// One label per line; blank lines are skipped.
    pub fn from_lines(content: &str) -> Self {
        Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn get(&self, idx: usize) -> String {
        self.labels
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", idx))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
