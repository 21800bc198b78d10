use crate::DecodeError;

/// Decodes one delimited text record into a row of `f64` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineDecoder {
    delimiter: char,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

impl LineDecoder {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Parses a record. Blank lines yield `Ok(None)`.
    ///
    /// Surrounding whitespace (including a trailing `\r`) is ignored around
    /// every field. Width is not checked here; the buffer does that.
    pub fn decode(&self, line: &str) -> Result<Option<Vec<f64>>, DecodeError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        line.split(self.delimiter)
            .enumerate()
            .map(|(index, raw)| {
                let raw = raw.trim();
                let value: f64 = raw.parse().map_err(|_| DecodeError::InvalidField {
                    index,
                    value: raw.to_owned(),
                })?;
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(DecodeError::NonFinite { index, value })
                }
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}
