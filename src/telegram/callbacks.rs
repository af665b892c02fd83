//! Inline button payloads.
//!
//! Every `callback_data` string the bot produces is rendered from, and parsed
//! back into, a [`CallbackAction`]. Unknown payloads fail to parse and are
//! answered with an empty callback answer.

use std::fmt;
use std::str::FromStr;

use crate::core::types::Source;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    StartRegistration,
    Source(Source),
    /// 0-based catalog index
    Book(usize),
    ConfirmBooks,
    PaymentOptions,
    Pay {
        months: u32,
        user_id: i64,
    },
    Approve {
        user_id: i64,
        months: u32,
        bonus_months: u32,
    },
    Reject {
        user_id: i64,
    },
    ExtendSubscription,
    BackToMenu,
    Profile,
    MessageAdmin,
    ReplyTo {
        user_id: i64,
    },
    ResetBooks {
        user_id: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCallback(pub String);

impl fmt::Display for UnknownCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown callback data: {}", self.0)
    }
}

impl std::error::Error for UnknownCallback {}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::StartRegistration => f.write_str("start_registration"),
            CallbackAction::Source(source) => write!(f, "source_{}", source.as_str()),
            CallbackAction::Book(index) => write!(f, "book_{}", index),
            CallbackAction::ConfirmBooks => f.write_str("confirm_books"),
            CallbackAction::PaymentOptions => f.write_str("payment_options"),
            CallbackAction::Pay { months, user_id } => write!(f, "pay_{}_{}", months, user_id),
            CallbackAction::Approve {
                user_id,
                months,
                bonus_months,
            } => write!(f, "payment_approve_{}_{}_{}", user_id, months, bonus_months),
            CallbackAction::Reject { user_id } => write!(f, "payment_reject_{}", user_id),
            CallbackAction::ExtendSubscription => f.write_str("extend_subscription"),
            CallbackAction::BackToMenu => f.write_str("back_to_menu"),
            CallbackAction::Profile => f.write_str("profile"),
            CallbackAction::MessageAdmin => f.write_str("message_admin"),
            CallbackAction::ReplyTo { user_id } => write!(f, "reply_to_{}", user_id),
            CallbackAction::ResetBooks { user_id } => write!(f, "reset_books_{}", user_id),
        }
    }
}

impl FromStr for CallbackAction {
    type Err = UnknownCallback;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownCallback(data.to_string());

        match data {
            "start_registration" => return Ok(CallbackAction::StartRegistration),
            "confirm_books" => return Ok(CallbackAction::ConfirmBooks),
            "payment_options" => return Ok(CallbackAction::PaymentOptions),
            "extend_subscription" => return Ok(CallbackAction::ExtendSubscription),
            "back_to_menu" => return Ok(CallbackAction::BackToMenu),
            "profile" => return Ok(CallbackAction::Profile),
            "message_admin" => return Ok(CallbackAction::MessageAdmin),
            _ => {}
        }

        if let Some(rest) = data.strip_prefix("source_") {
            return rest.parse().map(CallbackAction::Source).map_err(|_| unknown());
        }
        if let Some(rest) = data.strip_prefix("book_") {
            return rest.parse().map(CallbackAction::Book).map_err(|_| unknown());
        }
        if let Some(rest) = data.strip_prefix("payment_approve_") {
            let parts = numbers(rest).ok_or_else(unknown)?;
            return match parts.as_slice() {
                [user_id, months, bonus] => Ok(CallbackAction::Approve {
                    user_id: *user_id,
                    months: to_u32(*months).filter(|m| *m > 0).ok_or_else(unknown)?,
                    bonus_months: to_u32(*bonus).ok_or_else(unknown)?,
                }),
                // Buttons sent before the month count was part of the payload
                [user_id, bonus] => Ok(CallbackAction::Approve {
                    user_id: *user_id,
                    months: 1,
                    bonus_months: to_u32(*bonus).ok_or_else(unknown)?,
                }),
                _ => Err(unknown()),
            };
        }
        if let Some(rest) = data.strip_prefix("payment_reject_") {
            return rest
                .parse()
                .map(|user_id| CallbackAction::Reject { user_id })
                .map_err(|_| unknown());
        }
        if let Some(rest) = data.strip_prefix("pay_") {
            let parts = numbers(rest).ok_or_else(unknown)?;
            return match parts.as_slice() {
                [months, user_id] => Ok(CallbackAction::Pay {
                    months: to_u32(*months).filter(|m| *m > 0).ok_or_else(unknown)?,
                    user_id: *user_id,
                }),
                _ => Err(unknown()),
            };
        }
        if let Some(rest) = data.strip_prefix("reply_to_") {
            return rest
                .parse()
                .map(|user_id| CallbackAction::ReplyTo { user_id })
                .map_err(|_| unknown());
        }
        if let Some(rest) = data.strip_prefix("reset_books_") {
            return rest
                .parse()
                .map(|user_id| CallbackAction::ResetBooks { user_id })
                .map_err(|_| unknown());
        }

        Err(unknown())
    }
}

fn numbers(rest: &str) -> Option<Vec<i64>> {
    rest.split('_').map(|part| part.parse().ok()).collect()
}

fn to_u32(value: i64) -> Option<u32> {
    u32::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_actions_parse_back() {
        let actions = [
            CallbackAction::StartRegistration,
            CallbackAction::Source(Source::Teacher),
            CallbackAction::Book(19),
            CallbackAction::ConfirmBooks,
            CallbackAction::PaymentOptions,
            CallbackAction::Pay {
                months: 3,
                user_id: 555,
            },
            CallbackAction::Approve {
                user_id: 555,
                months: 3,
                bonus_months: 1,
            },
            CallbackAction::Reject { user_id: 555 },
            CallbackAction::ExtendSubscription,
            CallbackAction::BackToMenu,
            CallbackAction::Profile,
            CallbackAction::MessageAdmin,
            CallbackAction::ReplyTo { user_id: 7 },
            CallbackAction::ResetBooks { user_id: 7 },
        ];
        for action in actions {
            assert_eq!(action.to_string().parse::<CallbackAction>(), Ok(action));
        }
    }

    #[test]
    fn legacy_approve_means_one_month() {
        assert_eq!(
            "payment_approve_555_1".parse::<CallbackAction>(),
            Ok(CallbackAction::Approve {
                user_id: 555,
                months: 1,
                bonus_months: 1,
            })
        );
    }

    #[test]
    fn payloads_stay_within_telegram_limit() {
        let action = CallbackAction::Approve {
            user_id: i64::MAX,
            months: u32::MAX,
            bonus_months: u32::MAX,
        };
        assert!(action.to_string().len() <= 64);
    }

    #[test]
    fn garbage_is_rejected() {
        for data in [
            "",
            "source_tiktok",
            "book_x",
            "book_-1",
            "pay_0_5",
            "pay_3",
            "payment_approve_",
            "payment_approve_1_2_3_4",
            "payment_approve_1_-2",
            "payment_approve_1_0_0",
            "payment_reject_abc",
            "reply_to_",
            "something_else",
        ] {
            assert!(data.parse::<CallbackAction>().is_err(), "{} should not parse", data);
        }
    }
}
