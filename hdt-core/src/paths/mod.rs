use serde_json::Value as JsonValue;

/// One element of a dotted extraction path (`a.b[].c`, `items[2].id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSeg {
    Field(String),
    /// `[]` — every element of the array at this position.
    Every,
    Index(usize),
}

/// A parsed extraction path over a JSON document. The empty path addresses
/// the document root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataPath {
    pub segs: Vec<PathSeg>,
}

impl DataPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self, PathError> {
        let mut segs = Vec::new();
        let trimmed = input.trim_start_matches('.');
        if trimmed.is_empty() {
            return Ok(Self { segs });
        }
        for token in trimmed.split('.') {
            if token.is_empty() {
                return Err(PathError::EmptySegment(input.to_string()));
            }
            let mut rest = token;
            // Field part before any bracket suffixes.
            if let Some(idx) = rest.find('[') {
                let (field, brackets) = rest.split_at(idx);
                if !field.is_empty() {
                    segs.push(PathSeg::Field(field.to_string()));
                }
                rest = brackets;
                while let Some(stripped) = rest.strip_prefix('[') {
                    let Some(close) = stripped.find(']') else {
                        return Err(PathError::UnclosedBracket(input.to_string()));
                    };
                    let inner = &stripped[..close];
                    if inner.is_empty() {
                        segs.push(PathSeg::Every);
                    } else {
                        let n = inner
                            .parse::<usize>()
                            .map_err(|_| PathError::BadIndex(inner.to_string()))?;
                        segs.push(PathSeg::Index(n));
                    }
                    rest = &stripped[close + 1..];
                }
                if !rest.is_empty() {
                    return Err(PathError::TrailingGarbage(input.to_string()));
                }
            } else {
                segs.push(PathSeg::Field(rest.to_string()));
            }
        }
        Ok(Self { segs })
    }

    pub fn is_root(&self) -> bool {
        self.segs.is_empty()
    }

    /// Whether the path fans out over an array (`[]` anywhere).
    pub fn is_multi(&self) -> bool {
        self.segs.iter().any(|s| matches!(s, PathSeg::Every))
    }

    pub fn child(&self, field: &str) -> Self {
        let mut segs = self.segs.clone();
        segs.push(PathSeg::Field(field.to_string()));
        Self { segs }
    }

    pub fn every(&self) -> Self {
        let mut segs = self.segs.clone();
        segs.push(PathSeg::Every);
        Self { segs }
    }

    /// Extract the value addressed by this path. An `[]` segment maps the
    /// remainder of the path over the array and yields the collected values;
    /// an empty array at an `[]` segment is an error.
    pub fn extract(&self, doc: &JsonValue) -> Result<JsonValue, PathError> {
        extract_at(doc, &self.segs, self)
    }
}

fn extract_at(doc: &JsonValue, segs: &[PathSeg], full: &DataPath) -> Result<JsonValue, PathError> {
    let Some((head, rest)) = segs.split_first() else {
        return Ok(doc.clone());
    };
    match head {
        PathSeg::Field(name) => {
            let next = doc
                .get(name)
                .ok_or_else(|| PathError::Missing(full.to_string()))?;
            extract_at(next, rest, full)
        }
        PathSeg::Index(n) => {
            let next = doc
                .get(n)
                .ok_or_else(|| PathError::Missing(full.to_string()))?;
            extract_at(next, rest, full)
        }
        PathSeg::Every => {
            let arr = doc
                .as_array()
                .ok_or_else(|| PathError::NotAnArray(full.to_string()))?;
            if arr.is_empty() {
                return Err(PathError::EmptyArray(full.to_string()));
            }
            let mut out = Vec::with_capacity(arr.len());
            for item in arr {
                out.push(extract_at(item, rest, full)?);
            }
            Ok(JsonValue::Array(out))
        }
    }
}

impl std::fmt::Display for DataPath {
    // `[]` glues to the previous field without a separating dot.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for seg in &self.segs {
            match seg {
                PathSeg::Field(name) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                PathSeg::Every => f.write_str("[]")?,
                PathSeg::Index(n) => write!(f, "[{n}]")?,
            }
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path {0:?} contains an empty segment")]
    EmptySegment(String),
    #[error("path {0:?} has an unclosed bracket")]
    UnclosedBracket(String),
    #[error("invalid array index {0:?}")]
    BadIndex(String),
    #[error("path {0:?} has characters after a bracket")]
    TrailingGarbage(String),
    #[error("no value at path {0}")]
    Missing(String),
    #[error("value at {0} is not an array")]
    NotAnArray(String),
    #[error("empty array at {0}")]
    EmptyArray(String),
}
