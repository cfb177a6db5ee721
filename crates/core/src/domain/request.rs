use crate::domain::wire;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

pub const MAX_NAME_LEN: usize = 10;
pub const MAX_EXCHANGE_LEN: usize = 10;
pub const ARTICLES_RANGE: RangeInclusive<u32> = 1..=100;

/// Raw add-stock form input, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default, deserialize_with = "wire::text")]
    pub num_of_articles: String,
}

/// Add-stock input that passed validation and may be sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidNewStock {
    pub name: String,
    pub exchange: String,
    pub num_of_articles: u32,
}

/// Raw research form input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRequest {
    #[serde(default, deserialize_with = "wire::text")]
    pub num_of_articles: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Exchange,
    NumOfArticles,
}

/// Per-field validation messages, rendered inline next to each input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<Field, String>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0.iter().map(|(f, m)| (*f, m.as_str()))
    }

    fn insert(&mut self, field: Field, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {message}", field.as_str())?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Exchange => "exchange",
            Self::NumOfArticles => "num_of_articles",
        }
    }
}

impl NewStockRequest {
    pub fn validate(&self) -> Result<ValidNewStock, FieldErrors> {
        let mut errors = FieldErrors::default();

        let name = self.name.trim();
        if let Err(msg) = validate_text("Name", name, MAX_NAME_LEN) {
            errors.insert(Field::Name, msg);
        }

        let exchange = self.exchange.trim();
        if let Err(msg) = validate_text("Exchange", exchange, MAX_EXCHANGE_LEN) {
            errors.insert(Field::Exchange, msg);
        }

        let num_of_articles = match validate_article_count(&self.num_of_articles) {
            Ok(n) => Some(n),
            Err(msg) => {
                errors.insert(Field::NumOfArticles, msg);
                None
            }
        };

        match num_of_articles {
            Some(num_of_articles) if errors.is_empty() => Ok(ValidNewStock {
                name: name.to_string(),
                exchange: exchange.to_string(),
                num_of_articles,
            }),
            _ => Err(errors),
        }
    }
}

impl ResearchRequest {
    pub fn validate(&self) -> Result<u32, FieldErrors> {
        validate_article_count(&self.num_of_articles).map_err(|msg| {
            let mut errors = FieldErrors::default();
            errors.insert(Field::NumOfArticles, msg);
            errors
        })
    }
}

fn validate_text(label: &str, value: &str, max_len: usize) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{label} is required"));
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(format!("{label} must be at most {max_len} characters (got {len})"));
    }
    Ok(())
}

pub fn validate_article_count(raw: &str) -> Result<u32, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Number of articles is required".to_string());
    }
    let n: u32 = raw
        .parse()
        .map_err(|_| format!("Number of articles must be a whole number (got {raw:?})"))?;
    if !ARTICLES_RANGE.contains(&n) {
        return Err(format!(
            "Number of articles must be between {} and {}",
            ARTICLES_RANGE.start(),
            ARTICLES_RANGE.end()
        ));
    }
    Ok(n)
}
