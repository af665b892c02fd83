//! Subscriber and promo-code ledger.
//!
//! The ledger is the only owner of durable billing state. Every function takes
//! a plain `&Connection` (pooled connections deref to it) and commits on its
//! own; registration is the one multi-statement operation and runs inside a
//! transaction so the promo claim and the insert land together.

use chrono::{Days, NaiveDate};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use crate::core::config::billing::DAYS_PER_MONTH;
use crate::core::types::Source;

/// Storage format of every calendar date in the ledger
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const SUBSCRIBER_COLUMNS: &str = "user_id, source, email, telegram, books, trial_end, payment_due, paid_months, payment_confirmed, promo_code, is_active, created_at";

const PROMO_COLUMNS: &str = "code, label, max_uses, used_count, bonus_days";

/// A subscriber row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    pub user_id: i64,
    pub source: Option<Source>,
    pub email: Option<String>,
    pub telegram: Option<String>,
    /// Selected book titles in the order they were picked
    pub books: Vec<String>,
    pub trial_end: NaiveDate,
    pub payment_due: NaiveDate,
    pub paid_months: i64,
    pub payment_confirmed: bool,
    pub promo_code: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDate,
}

impl Subscriber {
    pub fn has_promo(&self) -> bool {
        self.promo_code.is_some()
    }

    pub fn books_label(&self) -> Option<String> {
        if self.books.is_empty() {
            None
        } else {
            Some(self.books.join(", "))
        }
    }
}

/// Fields collected by the registration wizard
#[derive(Debug, Clone)]
pub struct NewSubscriber<'a> {
    pub user_id: i64,
    pub source: Source,
    pub email: &'a str,
    pub telegram: &'a str,
    pub books: &'a [String],
    pub promo_code: Option<&'a str>,
}

/// Outcome of [`register_subscriber`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Created(Subscriber),
    /// The id was already registered; nothing was written.
    AlreadyRegistered(Subscriber),
}

impl Registration {
    pub fn subscriber(&self) -> &Subscriber {
        match self {
            Registration::Created(s) | Registration::AlreadyRegistered(s) => s,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Registration::Created(_))
    }
}

/// A promo code row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoCode {
    pub code: String,
    /// Who the code was issued to (a teacher name for seeded codes)
    pub label: Option<String>,
    /// Usage cap, `None` for uncapped codes
    pub max_uses: Option<i64>,
    pub used_count: i64,
    pub bonus_days: i64,
}

impl PromoCode {
    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|cap| self.used_count >= cap)
    }
}

/// Aggregate counts for the admin `/stats` command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub total: i64,
    pub paid: i64,
    pub with_promo: i64,
}

/// Promo codes are matched case-insensitively and stored upper-case.
pub fn normalize_promo_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// `date + days`, failing instead of panicking when the result leaves chrono's range.
fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    u64::try_from(days)
        .ok()
        .and_then(|days| date.checked_add_days(Days::new(days)))
        .ok_or_else(|| rusqlite::Error::ToSqlConversionFailure(format!("{} + {} days is out of range", date, days).into()))
}

fn date_column(row: &Row<'_>, idx: usize) -> Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn split_books(raw: Option<String>) -> Vec<String> {
    raw.map(|joined| {
        joined
            .split(',')
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn join_books(books: &[String]) -> Option<String> {
    if books.is_empty() {
        None
    } else {
        Some(books.join(", "))
    }
}

fn parse_subscriber(row: &Row<'_>) -> Result<Subscriber> {
    let source: Option<String> = row.get(1)?;
    Ok(Subscriber {
        user_id: row.get(0)?,
        source: source.and_then(|s| s.parse().ok()),
        email: row.get(2)?,
        telegram: row.get(3)?,
        books: split_books(row.get(4)?),
        trial_end: date_column(row, 5)?,
        payment_due: date_column(row, 6)?,
        paid_months: row.get(7)?,
        payment_confirmed: row.get::<_, i32>(8)? != 0,
        promo_code: row.get(9)?,
        is_active: row.get::<_, i32>(10)? != 0,
        created_at: date_column(row, 11)?,
    })
}

fn parse_promo(row: &Row<'_>) -> Result<PromoCode> {
    Ok(PromoCode {
        code: row.get(0)?,
        label: row.get(1)?,
        max_uses: row.get(2)?,
        used_count: row.get(3)?,
        bonus_days: row.get(4)?,
    })
}

fn query_subscribers(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Subscriber>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, parse_subscriber)?;

    let mut subscribers = Vec::new();
    for row in rows {
        subscribers.push(row?);
    }
    Ok(subscribers)
}

/// Registers a subscriber, idempotently on `user_id`.
///
/// The trial ends `trial_days` after `today`, plus the promo code's bonus days
/// when the code exists and still has uses left; in that case the code's
/// usage counter is bumped in the same transaction. If the id is already
/// registered nothing is written (the promo counter included) and the stored
/// record is returned unchanged.
pub fn register_subscriber(
    conn: &Connection,
    new: &NewSubscriber<'_>,
    today: NaiveDate,
    trial_days: i64,
) -> Result<Registration> {
    let tx = conn.unchecked_transaction()?;

    if let Some(existing) = get_subscriber(&tx, new.user_id)? {
        log::info!("Registration ignored, user {} is already registered", new.user_id);
        return Ok(Registration::AlreadyRegistered(existing));
    }

    let mut days = trial_days;
    let mut applied_promo = None;
    if let Some(raw_code) = new.promo_code {
        let code = normalize_promo_code(raw_code);
        if increment_promo_usage(&tx, &code)? {
            if let Some(promo) = get_promo(&tx, &code)? {
                days += promo.bonus_days;
                applied_promo = Some(promo.code);
            }
        } else {
            log::warn!(
                "Promo code {} unknown or exhausted at commit time for user {}, registering without it",
                code,
                new.user_id
            );
        }
    }

    let trial_end = format_date(add_days(today, days)?);
    tx.execute(
        "INSERT INTO subscribers (user_id, source, email, telegram, books, trial_end, payment_due, paid_months, payment_confirmed, promo_code, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, 0, 0, ?7, 1, ?8)",
        params![
            new.user_id,
            new.source.as_str(),
            new.email,
            new.telegram,
            join_books(new.books),
            trial_end,
            applied_promo,
            format_date(today),
        ],
    )?;
    tx.commit()?;

    log::info!(
        "Registered subscriber {} (source={}, promo={:?}, trial_end={})",
        new.user_id,
        new.source,
        applied_promo,
        trial_end
    );

    let created = get_subscriber(conn, new.user_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    Ok(Registration::Created(created))
}

/// Fetches a subscriber by user id.
pub fn get_subscriber(conn: &Connection, user_id: i64) -> Result<Option<Subscriber>> {
    conn.query_row(
        &format!("SELECT {} FROM subscribers WHERE user_id = ?1", SUBSCRIBER_COLUMNS),
        params![user_id],
        parse_subscriber,
    )
    .optional()
}

/// True when `email` belongs to a subscriber other than `user_id`.
pub fn email_in_use(conn: &Connection, email: &str, user_id: i64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM subscribers WHERE email = ?1 COLLATE NOCASE AND user_id != ?2",
        params![email, user_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Records an approved payment.
///
/// Adds `months + bonus_months` to `paid_months`, marks the payment as
/// confirmed, reactivates the account and moves `payment_due` to
/// `today + 30 * (months + bonus_months)` days. The due date is recomputed
/// from `today`, so any entitlement left before the payment is not carried
/// over.
///
/// Returns the updated record, or `None` if the user is not registered.
pub fn confirm_payment(
    conn: &Connection,
    user_id: i64,
    months: u32,
    bonus_months: u32,
    today: NaiveDate,
) -> Result<Option<Subscriber>> {
    let total = i64::from(months) + i64::from(bonus_months);
    let payment_due = format_date(add_days(today, DAYS_PER_MONTH * total)?);

    let updated = conn.execute(
        "UPDATE subscribers
         SET paid_months = paid_months + ?1, payment_confirmed = 1, payment_due = ?2, is_active = 1
         WHERE user_id = ?3",
        params![total, payment_due, user_id],
    )?;
    if updated == 0 {
        return Ok(None);
    }

    log::info!(
        "Payment confirmed for user {}: {} month(s) + {} bonus, due {}",
        user_id,
        months,
        bonus_months,
        payment_due
    );
    get_subscriber(conn, user_id)
}

/// Marks a subscriber inactive. Returns false if the id is unknown.
pub fn deactivate_subscriber(conn: &Connection, user_id: i64) -> Result<bool> {
    let updated = conn.execute("UPDATE subscribers SET is_active = 0 WHERE user_id = ?1", params![user_id])?;
    if updated > 0 {
        log::info!("Subscriber {} deactivated", user_id);
    }
    Ok(updated > 0)
}

/// Clears the book selection so the subscriber can pick again.
pub fn reset_books(conn: &Connection, user_id: i64) -> Result<bool> {
    let updated = conn.execute("UPDATE subscribers SET books = NULL WHERE user_id = ?1", params![user_id])?;
    Ok(updated > 0)
}

/// Stores a new book selection.
pub fn set_books(conn: &Connection, user_id: i64, books: &[String]) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE subscribers SET books = ?1 WHERE user_id = ?2",
        params![join_books(books), user_id],
    )?;
    Ok(updated > 0)
}

/// Removes a subscriber. Admin-only.
pub fn delete_subscriber(conn: &Connection, user_id: i64) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM subscribers WHERE user_id = ?1", params![user_id])?;
    if deleted > 0 {
        log::info!("Subscriber {} deleted", user_id);
    }
    Ok(deleted > 0)
}

/// Looks up a promo code, case-insensitively.
pub fn get_promo(conn: &Connection, code: &str) -> Result<Option<PromoCode>> {
    conn.query_row(
        &format!("SELECT {} FROM promo_codes WHERE code = ?1", PROMO_COLUMNS),
        params![normalize_promo_code(code)],
        parse_promo,
    )
    .optional()
}

/// Bumps the usage counter of a code that still has uses left.
///
/// Returns false when the code is unknown or already at its cap.
pub fn increment_promo_usage(conn: &Connection, code: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE promo_codes SET used_count = used_count + 1
         WHERE code = ?1 AND (max_uses IS NULL OR used_count < max_uses)",
        params![normalize_promo_code(code)],
    )?;
    Ok(updated > 0)
}

/// Sets the usage counter back to zero. Returns false if the code is unknown.
pub fn reset_promo_usage(conn: &Connection, code: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE promo_codes SET used_count = 0 WHERE code = ?1",
        params![normalize_promo_code(code)],
    )?;
    Ok(updated > 0)
}

/// Creates a promo code. Returns false if the code already exists.
pub fn create_promo(
    conn: &Connection,
    code: &str,
    label: Option<&str>,
    max_uses: Option<i64>,
    bonus_days: i64,
) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO promo_codes (code, label, max_uses, used_count, bonus_days) VALUES (?1, ?2, ?3, 0, ?4)",
        params![normalize_promo_code(code), label, max_uses, bonus_days.max(0)],
    )?;
    Ok(inserted > 0)
}

/// Inserts the startup promo codes that are not present yet.
///
/// Existing codes keep their counters. Returns how many codes were added.
pub fn seed_promo_codes(conn: &Connection, codes: &[String], bonus_days: i64) -> Result<usize> {
    let mut added = 0;
    for code in codes {
        if create_promo(conn, code, Some(code), None, bonus_days)? {
            added += 1;
        }
    }
    if added > 0 {
        log::info!("Seeded {} promo code(s)", added);
    }
    Ok(added)
}

/// All promo codes, ordered by code.
pub fn list_promos(conn: &Connection) -> Result<Vec<PromoCode>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM promo_codes ORDER BY code", PROMO_COLUMNS))?;
    let rows = stmt.query_map([], parse_promo)?;

    let mut promos = Vec::new();
    for row in rows {
        promos.push(row?);
    }
    Ok(promos)
}

/// Counts of all, paid and promo-using subscribers.
pub fn get_stats(conn: &Connection) -> Result<LedgerStats> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN payment_confirmed = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN promo_code IS NOT NULL THEN 1 ELSE 0 END), 0)
         FROM subscribers",
        [],
        |row| {
            Ok(LedgerStats {
                total: row.get(0)?,
                paid: row.get(1)?,
                with_promo: row.get(2)?,
            })
        },
    )
}

/// Every subscriber, ordered by user id.
pub fn get_all_subscribers(conn: &Connection) -> Result<Vec<Subscriber>> {
    query_subscribers(
        conn,
        &format!("SELECT {} FROM subscribers ORDER BY user_id", SUBSCRIBER_COLUMNS),
        [],
    )
}

/// Active, unconfirmed subscribers whose payment is due on `date`.
pub fn get_unpaid_due_on(conn: &Connection, date: NaiveDate) -> Result<Vec<Subscriber>> {
    query_subscribers(
        conn,
        &format!(
            "SELECT {} FROM subscribers WHERE payment_due = ?1 AND payment_confirmed = 0 AND is_active = 1 ORDER BY user_id",
            SUBSCRIBER_COLUMNS
        ),
        params![format_date(date)],
    )
}

/// Active, unconfirmed subscribers whose trial ends on `date`.
pub fn get_trials_ending_on(conn: &Connection, date: NaiveDate) -> Result<Vec<Subscriber>> {
    query_subscribers(
        conn,
        &format!(
            "SELECT {} FROM subscribers WHERE trial_end = ?1 AND payment_confirmed = 0 AND is_active = 1 ORDER BY user_id",
            SUBSCRIBER_COLUMNS
        ),
        params![format_date(date)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::migrations::run_migrations;
    use pretty_assertions::assert_eq;

    fn make_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        conn
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn books() -> Vec<String> {
        vec!["Essential 1".to_string(), "Essential 2".to_string(), "Essential 3".to_string()]
    }

    fn new_subscriber<'a>(user_id: i64, email: &'a str, books: &'a [String], promo: Option<&'a str>) -> NewSubscriber<'a> {
        NewSubscriber {
            user_id,
            source: if promo.is_some() { Source::Teacher } else { Source::Instagram },
            email,
            telegram: "@reader",
            books,
            promo_code: promo,
        }
    }

    // ── register_subscriber ──────────────────────────────────────────────────

    #[test]
    fn registration_without_promo_gets_three_day_trial() {
        let conn = make_conn();
        let books = books();
        let reg = register_subscriber(&conn, &new_subscriber(1, "a@x.io", &books, None), day("2024-03-01"), 3).unwrap();

        assert!(reg.is_created());
        let s = reg.subscriber();
        assert_eq!(s.trial_end, day("2024-03-04"));
        assert_eq!(s.payment_due, s.trial_end);
        assert_eq!(s.paid_months, 0);
        assert!(!s.payment_confirmed);
        assert!(s.is_active);
        assert_eq!(s.promo_code, None);
        assert_eq!(s.books, books);
        assert_eq!(s.source, Some(Source::Instagram));
        assert_eq!(s.created_at, day("2024-03-01"));
    }

    #[test]
    fn registration_with_promo_adds_bonus_days_and_counts_usage() {
        let conn = make_conn();
        create_promo(&conn, "SPRING", Some("Ms. Karimova"), Some(5), 7).unwrap();
        let books = books();

        let reg =
            register_subscriber(&conn, &new_subscriber(1, "a@x.io", &books, Some("spring")), day("2024-03-01"), 3)
                .unwrap();

        let s = reg.subscriber();
        assert_eq!(s.trial_end, day("2024-03-11"));
        assert_eq!(s.payment_due, day("2024-03-11"));
        assert_eq!(s.promo_code.as_deref(), Some("SPRING"));
        assert_eq!(get_promo(&conn, "SPRING").unwrap().unwrap().used_count, 1);
    }

    #[test]
    fn repeated_registration_keeps_first_record() {
        let conn = make_conn();
        create_promo(&conn, "SPRING", None, None, 7).unwrap();
        let first_books = books();
        let other_books = vec!["Essential 4".to_string(), "Essential 5".to_string(), "Essential 6".to_string()];

        register_subscriber(&conn, &new_subscriber(1, "a@x.io", &first_books, None), day("2024-03-01"), 3).unwrap();
        confirm_payment(&conn, 1, 1, 0, day("2024-03-02")).unwrap();

        let again = register_subscriber(
            &conn,
            &new_subscriber(1, "b@x.io", &other_books, Some("SPRING")),
            day("2024-04-01"),
            3,
        )
        .unwrap();

        assert!(!again.is_created());
        let s = again.subscriber();
        assert_eq!(s.email.as_deref(), Some("a@x.io"));
        assert_eq!(s.books, first_books);
        assert_eq!(s.paid_months, 1);
        assert!(s.payment_confirmed);
        assert_eq!(s.trial_end, day("2024-03-04"));
        assert_eq!(get_all_subscribers(&conn).unwrap().len(), 1);
        // The rejected attempt must not consume the promo code
        assert_eq!(get_promo(&conn, "SPRING").unwrap().unwrap().used_count, 0);
    }

    #[test]
    fn exhausted_promo_is_not_applied_or_incremented() {
        let conn = make_conn();
        create_promo(&conn, "ONCE", None, Some(1), 10).unwrap();
        let books = books();

        register_subscriber(&conn, &new_subscriber(1, "a@x.io", &books, Some("ONCE")), day("2024-03-01"), 3).unwrap();
        let second =
            register_subscriber(&conn, &new_subscriber(2, "b@x.io", &books, Some("ONCE")), day("2024-03-01"), 3)
                .unwrap();

        let s = second.subscriber();
        assert_eq!(s.trial_end, day("2024-03-04"));
        assert_eq!(s.promo_code, None);
        let promo = get_promo(&conn, "once").unwrap().unwrap();
        assert_eq!(promo.used_count, 1);
        assert!(promo.is_exhausted());
    }

    #[test]
    fn unknown_promo_registers_without_bonus() {
        let conn = make_conn();
        let books = books();
        let reg =
            register_subscriber(&conn, &new_subscriber(1, "a@x.io", &books, Some("NOPE")), day("2024-03-01"), 3)
                .unwrap();
        assert_eq!(reg.subscriber().trial_end, day("2024-03-04"));
        assert_eq!(reg.subscriber().promo_code, None);
    }

    #[test]
    fn email_in_use_ignores_own_record_and_case() {
        let conn = make_conn();
        let books = books();
        register_subscriber(&conn, &new_subscriber(1, "Reader@x.io", &books, None), day("2024-03-01"), 3).unwrap();

        assert!(email_in_use(&conn, "reader@x.io", 2).unwrap());
        assert!(!email_in_use(&conn, "reader@x.io", 1).unwrap());
        assert!(!email_in_use(&conn, "other@x.io", 2).unwrap());
    }

    // ── confirm_payment ──────────────────────────────────────────────────────

    #[test]
    fn confirm_payment_with_bonus() {
        let conn = make_conn();
        let books = books();
        register_subscriber(&conn, &new_subscriber(1, "a@x.io", &books, None), day("2024-03-01"), 3).unwrap();
        deactivate_subscriber(&conn, 1).unwrap();

        let s = confirm_payment(&conn, 1, 3, 1, day("2024-03-10")).unwrap().unwrap();
        assert_eq!(s.paid_months, 4);
        assert!(s.payment_confirmed);
        assert!(s.is_active);
        assert_eq!(s.payment_due, day("2024-07-08"));
        // Trial end is never touched by payments
        assert_eq!(s.trial_end, day("2024-03-04"));
    }

    #[test]
    fn repeated_payment_recomputes_due_from_today() {
        let conn = make_conn();
        let books = books();
        register_subscriber(&conn, &new_subscriber(1, "a@x.io", &books, None), day("2024-03-01"), 3).unwrap();

        confirm_payment(&conn, 1, 1, 0, day("2024-03-01")).unwrap();
        let s = confirm_payment(&conn, 1, 1, 0, day("2024-03-15")).unwrap().unwrap();
        assert_eq!(s.paid_months, 2);
        assert_eq!(s.payment_due, day("2024-04-14"));
    }

    #[test]
    fn confirm_payment_for_unknown_user_is_none() {
        let conn = make_conn();
        assert_eq!(confirm_payment(&conn, 99, 1, 0, day("2024-03-01")).unwrap(), None);
    }

    #[test]
    fn payment_past_the_calendar_is_an_error() {
        let conn = make_conn();
        let books = books();
        register_subscriber(&conn, &new_subscriber(1, "a@x.io", &books, None), day("2024-03-01"), 3).unwrap();

        assert!(confirm_payment(&conn, 1, u32::MAX, u32::MAX, day("2024-03-01")).is_err());
        let s = get_subscriber(&conn, 1).unwrap().unwrap();
        assert_eq!(s.paid_months, 0);
        assert!(!s.payment_confirmed);
    }

    #[test]
    fn oversized_promo_bonus_fails_registration_and_keeps_the_counter() {
        let conn = make_conn();
        create_promo(&conn, "BIG", None, None, 100_000_000).unwrap();
        let books = books();

        let result = register_subscriber(&conn, &new_subscriber(1, "a@x.io", &books, Some("BIG")), day("2024-03-01"), 3);
        assert!(result.is_err());
        assert_eq!(get_subscriber(&conn, 1).unwrap(), None);
        assert_eq!(get_promo(&conn, "BIG").unwrap().unwrap().used_count, 0);
    }

    // ── books ────────────────────────────────────────────────────────────────

    #[test]
    fn reset_and_set_books() {
        let conn = make_conn();
        let books = books();
        register_subscriber(&conn, &new_subscriber(1, "a@x.io", &books, None), day("2024-03-01"), 3).unwrap();

        assert!(reset_books(&conn, 1).unwrap());
        let s = get_subscriber(&conn, 1).unwrap().unwrap();
        assert!(s.books.is_empty());
        assert_eq!(s.books_label(), None);

        let new_books = vec!["Essential 6".to_string(), "Essential 1 (rus)".to_string(), "Essential 2".to_string()];
        assert!(set_books(&conn, 1, &new_books).unwrap());
        assert_eq!(get_subscriber(&conn, 1).unwrap().unwrap().books, new_books);

        assert!(!reset_books(&conn, 42).unwrap());
    }

    // ── promo codes ──────────────────────────────────────────────────────────

    #[test]
    fn promo_lookup_is_case_insensitive() {
        let conn = make_conn();
        create_promo(&conn, "Teacher01", Some("Teacher01"), None, 7).unwrap();
        let promo = get_promo(&conn, "teacher01").unwrap().unwrap();
        assert_eq!(promo.code, "TEACHER01");
        assert_eq!(promo.bonus_days, 7);
        assert!(!promo.is_exhausted());
    }

    #[test]
    fn increment_respects_cap_and_reset_restores() {
        let conn = make_conn();
        create_promo(&conn, "TWICE", None, Some(2), 5).unwrap();

        assert!(increment_promo_usage(&conn, "TWICE").unwrap());
        assert!(increment_promo_usage(&conn, "TWICE").unwrap());
        assert!(!increment_promo_usage(&conn, "TWICE").unwrap());
        assert_eq!(get_promo(&conn, "TWICE").unwrap().unwrap().used_count, 2);

        assert!(reset_promo_usage(&conn, "twice").unwrap());
        assert_eq!(get_promo(&conn, "TWICE").unwrap().unwrap().used_count, 0);
        assert!(!reset_promo_usage(&conn, "missing").unwrap());
        assert!(!increment_promo_usage(&conn, "missing").unwrap());
    }

    #[test]
    fn seeding_is_idempotent() {
        let conn = make_conn();
        let codes = vec!["TEACHER01".to_string(), "TEACHER02".to_string()];
        assert_eq!(seed_promo_codes(&conn, &codes, 7).unwrap(), 2);
        increment_promo_usage(&conn, "TEACHER01").unwrap();
        assert_eq!(seed_promo_codes(&conn, &codes, 7).unwrap(), 0);

        let promos = list_promos(&conn).unwrap();
        assert_eq!(promos.len(), 2);
        assert_eq!(promos[0].used_count, 1);
        assert!(!create_promo(&conn, "teacher02", None, None, 1).unwrap());
    }

    // ── queries ──────────────────────────────────────────────────────────────

    #[test]
    fn stats_count_paid_and_promo_subscribers() {
        let conn = make_conn();
        create_promo(&conn, "SPRING", None, None, 7).unwrap();
        let books = books();
        register_subscriber(&conn, &new_subscriber(1, "a@x.io", &books, None), day("2024-03-01"), 3).unwrap();
        register_subscriber(&conn, &new_subscriber(2, "b@x.io", &books, Some("SPRING")), day("2024-03-01"), 3)
            .unwrap();
        register_subscriber(&conn, &new_subscriber(3, "c@x.io", &books, None), day("2024-03-01"), 3).unwrap();
        confirm_payment(&conn, 3, 1, 0, day("2024-03-02")).unwrap();

        assert_eq!(
            get_stats(&conn).unwrap(),
            LedgerStats {
                total: 3,
                paid: 1,
                with_promo: 1
            }
        );
    }

    #[test]
    fn sweep_queries_filter_confirmed_and_inactive() {
        let conn = make_conn();
        let books = books();
        for (id, email) in [(1, "a@x.io"), (2, "b@x.io"), (3, "c@x.io")] {
            register_subscriber(&conn, &new_subscriber(id, email, &books, None), day("2024-03-01"), 3).unwrap();
        }
        confirm_payment(&conn, 2, 1, 0, day("2024-03-01")).unwrap();
        deactivate_subscriber(&conn, 3).unwrap();

        let due: Vec<i64> = get_unpaid_due_on(&conn, day("2024-03-04"))
            .unwrap()
            .iter()
            .map(|s| s.user_id)
            .collect();
        assert_eq!(due, vec![1]);

        let ending: Vec<i64> = get_trials_ending_on(&conn, day("2024-03-04"))
            .unwrap()
            .iter()
            .map(|s| s.user_id)
            .collect();
        assert_eq!(ending, vec![1]);

        assert!(get_unpaid_due_on(&conn, day("2024-03-05")).unwrap().is_empty());
    }

    #[test]
    fn delete_subscriber_removes_row() {
        let conn = make_conn();
        let books = books();
        register_subscriber(&conn, &new_subscriber(1, "a@x.io", &books, None), day("2024-03-01"), 3).unwrap();
        assert!(delete_subscriber(&conn, 1).unwrap());
        assert_eq!(get_subscriber(&conn, 1).unwrap(), None);
        assert!(!delete_subscriber(&conn, 1).unwrap());
    }
}
