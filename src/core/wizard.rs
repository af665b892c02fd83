//! Input validation for the registration and payment wizards.
//!
//! Everything here is pure: handlers feed in the raw user input together with
//! what they already know and get back either the normalized value to store or
//! a [`WizardError`] that means "re-prompt the same step".

use thiserror::Error;

use crate::core::config::billing::BOOKS_PER_SUBSCRIBER;
use crate::storage::ledger::{normalize_promo_code, PromoCode};

/// Words accepted in the promo step to skip the code
const PROMO_SKIP_WORDS: &[&str] = &["-", "no", "none", "skip", "нет", "йўқ", "yoq", "yo'q"];

/// Rejected wizard input. The step does not advance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("empty input")]
    Empty,

    #[error("unknown promo code {0}")]
    UnknownPromo(String),

    #[error("promo code {0} has no uses left")]
    PromoExhausted(String),

    #[error("malformed email {0}")]
    InvalidEmail(String),

    #[error("email {0} belongs to another subscriber")]
    EmailTaken(String),

    #[error("malformed book list {0}")]
    MalformedBooks(String),

    #[error("book index {index} outside 1..={max}")]
    BookOutOfRange { index: usize, max: usize },

    #[error("expected {expected} distinct books, got {got}")]
    WrongBookCount { expected: usize, got: usize },

    #[error("selection limit of {0} books reached")]
    SelectionFull(usize),
}

impl WizardError {
    /// Re-prompt text shown to the user
    pub fn user_message(&self) -> String {
        match self {
            WizardError::Empty => "Пожалуйста, отправьте ответ текстом.".to_string(),
            WizardError::UnknownPromo(_) => {
                "❌ Такого промокода нет. Проверьте код или напишите «нет», чтобы продолжить без него.".to_string()
            }
            WizardError::PromoExhausted(_) => {
                "❌ Этот промокод уже использован максимальное количество раз. Введите другой или напишите «нет»."
                    .to_string()
            }
            WizardError::InvalidEmail(_) => "❌ Это не похоже на email. Попробуйте ещё раз.".to_string(),
            WizardError::EmailTaken(_) => "❌ Этот email уже зарегистрирован. Укажите другой.".to_string(),
            WizardError::MalformedBooks(_) => format!(
                "❌ Отправьте {} номера книг через запятую, например: 1, 5, 12",
                BOOKS_PER_SUBSCRIBER
            ),
            WizardError::BookOutOfRange { max, .. } => format!("❌ Номера книг должны быть от 1 до {}.", max),
            WizardError::WrongBookCount { expected, got } => {
                format!("❌ Нужно выбрать ровно {} разные книги, а выбрано {}.", expected, got)
            }
            WizardError::SelectionFull(limit) => format!("Можно выбрать не больше {} книг.", limit),
        }
    }
}

/// Answer to the promo step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoInput {
    Skip,
    /// Upper-cased code to look up
    Code(String),
}

pub fn parse_promo_input(text: &str) -> Result<PromoInput, WizardError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(WizardError::Empty);
    }
    let lowered = trimmed.to_lowercase();
    if PROMO_SKIP_WORDS.contains(&lowered.as_str()) {
        return Ok(PromoInput::Skip);
    }
    Ok(PromoInput::Code(normalize_promo_code(trimmed)))
}

/// Accepts a looked-up promo code if it exists and still has uses left.
pub fn check_promo(code: &str, found: Option<PromoCode>) -> Result<PromoCode, WizardError> {
    match found {
        None => Err(WizardError::UnknownPromo(code.to_string())),
        Some(promo) if promo.is_exhausted() => Err(WizardError::PromoExhausted(promo.code)),
        Some(promo) => Ok(promo),
    }
}

/// Validates an email address and returns it trimmed.
pub fn validate_email(text: &str) -> Result<String, WizardError> {
    let email = text.trim();
    if email.is_empty() {
        return Err(WizardError::Empty);
    }
    let invalid = || WizardError::InvalidEmail(email.to_string());

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return Err(invalid());
    };
    if host.is_empty() || tld.len() < 2 || domain.starts_with('.') || domain.contains("..") {
        return Err(invalid());
    }
    Ok(email.to_string())
}

/// Normalizes a Telegram contact. Bare usernames get a leading `@`.
pub fn normalize_handle(text: &str) -> Result<String, WizardError> {
    let handle = text.trim();
    if handle.is_empty() {
        return Err(WizardError::Empty);
    }
    let is_bare_username = !handle.starts_with('@')
        && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && handle.chars().any(|c| c.is_ascii_alphabetic());
    if is_bare_username {
        Ok(format!("@{}", handle))
    } else {
        Ok(handle.to_string())
    }
}

/// Parses a text book selection such as `1, 5 12` into 0-based indices.
///
/// Exactly [`BOOKS_PER_SUBSCRIBER`] distinct numbers in `1..=catalog_len` are
/// required; order is kept.
pub fn parse_book_indices(text: &str, catalog_len: usize) -> Result<Vec<usize>, WizardError> {
    let parts: Vec<&str> = text
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        return Err(WizardError::MalformedBooks(text.trim().to_string()));
    }

    let mut indices = Vec::with_capacity(parts.len());
    for part in parts {
        let index: usize = part
            .parse()
            .map_err(|_| WizardError::MalformedBooks(text.trim().to_string()))?;
        if index == 0 || index > catalog_len {
            return Err(WizardError::BookOutOfRange {
                index,
                max: catalog_len,
            });
        }
        if !indices.contains(&(index - 1)) {
            indices.push(index - 1);
        }
    }

    if indices.len() != BOOKS_PER_SUBSCRIBER {
        return Err(WizardError::WrongBookCount {
            expected: BOOKS_PER_SUBSCRIBER,
            got: indices.len(),
        });
    }
    Ok(indices)
}

/// Result of pressing a book button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Added,
    Removed,
}

/// Adds or removes a 0-based catalog index from the running selection.
pub fn toggle_book(selected: &mut Vec<usize>, index: usize, catalog_len: usize) -> Result<Toggle, WizardError> {
    if index >= catalog_len {
        return Err(WizardError::BookOutOfRange {
            index: index + 1,
            max: catalog_len,
        });
    }
    if let Some(pos) = selected.iter().position(|&i| i == index) {
        selected.remove(pos);
        return Ok(Toggle::Removed);
    }
    if selected.len() >= BOOKS_PER_SUBSCRIBER {
        return Err(WizardError::SelectionFull(BOOKS_PER_SUBSCRIBER));
    }
    selected.push(index);
    Ok(Toggle::Added)
}

/// The confirm button only completes a full selection.
pub fn confirm_selection(selected: &[usize]) -> Result<(), WizardError> {
    if selected.len() == BOOKS_PER_SUBSCRIBER {
        Ok(())
    } else {
        Err(WizardError::WrongBookCount {
            expected: BOOKS_PER_SUBSCRIBER,
            got: selected.len(),
        })
    }
}

/// Maps 0-based indices to catalog titles, skipping stale indices.
pub fn resolve_titles(indices: &[usize], catalog: &[String]) -> Vec<String> {
    indices.iter().filter_map(|&i| catalog.get(i).cloned()).collect()
}

/// Bonus months pre-filled on the admin approve button.
///
/// A three-month purchase comes with one free month.
pub fn suggested_bonus_months(months: u32) -> u32 {
    if months >= 3 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn promo(max_uses: Option<i64>, used_count: i64) -> PromoCode {
        PromoCode {
            code: "SPRING".to_string(),
            label: None,
            max_uses,
            used_count,
            bonus_days: 7,
        }
    }

    #[test]
    fn promo_skip_words_are_case_insensitive() {
        assert_eq!(parse_promo_input("НЕТ").unwrap(), PromoInput::Skip);
        assert_eq!(parse_promo_input(" none ").unwrap(), PromoInput::Skip);
        assert_eq!(parse_promo_input("-").unwrap(), PromoInput::Skip);
        assert_eq!(parse_promo_input("spring").unwrap(), PromoInput::Code("SPRING".to_string()));
        assert_eq!(parse_promo_input("   "), Err(WizardError::Empty));
    }

    #[test]
    fn promo_at_cap_is_rejected() {
        assert_eq!(
            check_promo("SPRING", Some(promo(Some(3), 3))),
            Err(WizardError::PromoExhausted("SPRING".to_string()))
        );
        assert_eq!(
            check_promo("NOPE", None),
            Err(WizardError::UnknownPromo("NOPE".to_string()))
        );
        assert!(check_promo("SPRING", Some(promo(Some(3), 2))).is_ok());
        assert!(check_promo("SPRING", Some(promo(None, 1000))).is_ok());
    }

    #[test]
    fn email_shapes() {
        assert_eq!(validate_email("  reader@mail.uz ").unwrap(), "reader@mail.uz");
        assert!(validate_email("reader.mail.uz").is_err());
        assert!(validate_email("@mail.uz").is_err());
        assert!(validate_email("reader@mail").is_err());
        assert!(validate_email("reader@.uz").is_err());
        assert!(validate_email("rea der@mail.uz").is_err());
        assert!(validate_email("a@b@c.uz").is_err());
        assert_eq!(validate_email(""), Err(WizardError::Empty));
    }

    #[test]
    fn handles_get_at_prefix() {
        assert_eq!(normalize_handle("reader_01").unwrap(), "@reader_01");
        assert_eq!(normalize_handle("@reader").unwrap(), "@reader");
        assert_eq!(normalize_handle("+998 90 123 45 67").unwrap(), "+998 90 123 45 67");
        assert!(normalize_handle(" ").is_err());
    }

    #[test]
    fn text_selection_needs_three_distinct_in_range() {
        assert_eq!(parse_book_indices("1, 5, 20", 20).unwrap(), vec![0, 4, 19]);
        assert_eq!(parse_book_indices("3 2;1", 20).unwrap(), vec![2, 1, 0]);

        assert_eq!(
            parse_book_indices("1, 2", 20),
            Err(WizardError::WrongBookCount { expected: 3, got: 2 })
        );
        assert_eq!(
            parse_book_indices("1, 2, 3, 4", 20),
            Err(WizardError::WrongBookCount { expected: 3, got: 4 })
        );
        assert_eq!(
            parse_book_indices("1, 1, 2", 20),
            Err(WizardError::WrongBookCount { expected: 3, got: 2 })
        );
        assert_eq!(
            parse_book_indices("0, 1, 2", 20),
            Err(WizardError::BookOutOfRange { index: 0, max: 20 })
        );
        assert_eq!(
            parse_book_indices("1, 2, 21", 20),
            Err(WizardError::BookOutOfRange { index: 21, max: 20 })
        );
        assert!(matches!(
            parse_book_indices("one, two, three", 20),
            Err(WizardError::MalformedBooks(_))
        ));
        assert!(matches!(parse_book_indices("", 20), Err(WizardError::MalformedBooks(_))));
    }

    #[test]
    fn toggling_is_capped_at_three() {
        let mut selected = Vec::new();
        assert_eq!(toggle_book(&mut selected, 0, 20), Ok(Toggle::Added));
        assert_eq!(toggle_book(&mut selected, 4, 20), Ok(Toggle::Added));
        assert_eq!(confirm_selection(&selected), Err(WizardError::WrongBookCount { expected: 3, got: 2 }));
        assert_eq!(toggle_book(&mut selected, 7, 20), Ok(Toggle::Added));
        assert_eq!(toggle_book(&mut selected, 9, 20), Err(WizardError::SelectionFull(3)));
        assert_eq!(selected, vec![0, 4, 7]);
        assert_eq!(confirm_selection(&selected), Ok(()));

        assert_eq!(toggle_book(&mut selected, 4, 20), Ok(Toggle::Removed));
        assert_eq!(selected, vec![0, 7]);
        assert!(toggle_book(&mut selected, 20, 20).is_err());
    }

    #[test]
    fn titles_follow_selection_order() {
        let catalog: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        assert_eq!(resolve_titles(&[3, 0, 9], &catalog), vec!["D", "A"]);
    }

    #[test]
    fn three_months_come_with_a_bonus() {
        assert_eq!(suggested_bonus_months(1), 0);
        assert_eq!(suggested_bonus_months(3), 1);
    }
}
