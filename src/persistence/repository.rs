//! Game Repositories
//!
//! Data access for sessions, holdings, prices, news and user stats.
//! Multi-step mutations (trade, turn advance, completion) run inside a
//! single transaction so that balance and ledger always move together.
//! Same-session races are guarded with compare-and-swap predicates on the
//! previously read balance (and, for turn transitions, the year): a lost
//! race reports `Ok(false)` and the caller decides how to surface it.

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::{debug, error};

use super::models::*;
use super::{DbPool, StoreError};
use crate::domain::entities::company::Company;
use crate::domain::entities::holding::Holding;
use crate::domain::entities::session::Session;

/// Atomic balance + ledger mutation for one trade.
#[derive(Debug, Clone)]
pub struct TradeUpdate {
    pub session_id: i64,
    /// Balance the caller read before validating; the swap only applies if
    /// it is still current.
    pub expected_balance: f64,
    pub new_balance: f64,
    pub company_id: i64,
    pub year: i64,
    /// Post-trade quantity. Zero deletes the ledger row.
    pub new_quantity: i64,
    pub avg_price: f64,
}

/// Company catalog repository
pub struct CompanyRepository {
    pool: DbPool,
}

impl CompanyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Seed the catalog with the given names if it is empty.
    pub async fn seed_if_empty(&self, names: &[&str]) -> Result<u64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM companies")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to count companies: {}", e)))?;

        if count.0 > 0 {
            return Ok(0);
        }

        let mut inserted = 0;
        for name in names {
            sqlx::query("INSERT OR IGNORE INTO companies (name) VALUES (?1)")
                .bind(name)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Query(format!("Failed to seed company: {}", e)))?;
            inserted += 1;
        }

        debug!("Seeded {} companies into the catalog", inserted);
        Ok(inserted)
    }

    pub async fn create(&self, name: &str) -> Result<CompanyRecord, StoreError> {
        sqlx::query_as::<_, CompanyRecord>(
            "INSERT INTO companies (name) VALUES (?1) RETURNING *",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create company {}: {}", name, e);
            StoreError::Query(format!("Failed to create company: {}", e))
        })
    }

    pub async fn get(&self, company_id: i64) -> Result<Option<Company>, StoreError> {
        let record = sqlx::query_as::<_, CompanyRecord>(
            "SELECT * FROM companies WHERE company_id = ?1",
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to get company: {}", e)))?;

        Ok(record.map(Company::from))
    }

    /// Pick a random subset of the catalog for a new session.
    pub async fn pick_random(&self, n: i64) -> Result<Vec<CompanyRecord>, StoreError> {
        sqlx::query_as::<_, CompanyRecord>(
            "SELECT * FROM companies ORDER BY RANDOM() LIMIT ?1",
        )
        .bind(n)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to pick companies: {}", e)))
    }
}

/// Session + ledger repository
pub struct SessionRepository {
    pool: DbPool,
}

impl SessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create a session and attach its company set in one transaction.
    pub async fn create(
        &self,
        user_id: i64,
        start_balance: f64,
        start_year: i64,
        company_ids: &[i64],
    ) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let session_id: i64 = sqlx::query(
            r#"
            INSERT INTO game_sessions
                (user_id, status, start_balance, current_balance, start_year, current_year, created_at)
            VALUES (?1, 'active', ?2, ?2, ?3, ?3, ?4)
            "#,
        )
        .bind(user_id)
        .bind(start_balance)
        .bind(start_year)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to create session for user {}: {}", user_id, e);
            StoreError::Query(format!("Failed to create session: {}", e))
        })?
        .last_insert_rowid();

        for company_id in company_ids {
            sqlx::query("INSERT INTO session_companies (session_id, company_id) VALUES (?1, ?2)")
                .bind(session_id)
                .bind(company_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    StoreError::Query(format!("Failed to attach company to session: {}", e))
                })?;
        }

        tx.commit().await?;

        debug!("Created session {} for user {}", session_id, user_id);
        Ok(session_id)
    }

    pub async fn get(&self, session_id: i64) -> Result<Option<Session>, StoreError> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT * FROM game_sessions WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get session {}: {}", session_id, e);
            StoreError::Query(format!("Failed to get session: {}", e))
        })?;

        record.map(Session::try_from).transpose()
    }

    /// Fetch a session only if it belongs to `user_id`. A foreign session
    /// is indistinguishable from a missing one.
    pub async fn get_owned(
        &self,
        session_id: i64,
        user_id: i64,
    ) -> Result<Option<Session>, StoreError> {
        Ok(self
            .get(session_id)
            .await?
            .filter(|session| session.user_id == user_id))
    }

    pub async fn company_ids(&self, session_id: i64) -> Result<Vec<i64>, StoreError> {
        let rows = sqlx::query(
            "SELECT company_id FROM session_companies WHERE session_id = ?1 ORDER BY company_id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to get session companies: {}", e)))?;

        Ok(rows.iter().map(|row| row.get("company_id")).collect())
    }

    pub async fn is_company_attached(
        &self,
        session_id: i64,
        company_id: i64,
    ) -> Result<bool, StoreError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM session_companies WHERE session_id = ?1 AND company_id = ?2",
        )
        .bind(session_id)
        .bind(company_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to check session company: {}", e)))?;

        Ok(count.0 > 0)
    }

    /// Attached companies joined with their price for the given year.
    pub async fn companies_with_prices(
        &self,
        session_id: i64,
        year: i64,
    ) -> Result<Vec<CompanyPriceRecord>, StoreError> {
        sqlx::query_as::<_, CompanyPriceRecord>(
            r#"
            SELECT c.company_id, c.name, sp.price
            FROM session_companies sc
            JOIN companies c ON sc.company_id = c.company_id
            JOIN stock_prices sp ON c.company_id = sp.company_id AND sp.year = ?2
            WHERE sc.session_id = ?1
            ORDER BY c.company_id
            "#,
        )
        .bind(session_id)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to get session prices: {}", e)))
    }

    /// Prior-year vs given-year price movement for the attached companies.
    /// Companies without a prior-year price (the start year) drop out.
    pub async fn price_changes(
        &self,
        session_id: i64,
        year: i64,
    ) -> Result<Vec<PriceChangeRecord>, StoreError> {
        sqlx::query_as::<_, PriceChangeRecord>(
            r#"
            SELECT
                c.company_id,
                c.name AS company_name,
                prev.price AS previous_price,
                curr.price AS current_price
            FROM session_companies sc
            JOIN companies c ON sc.company_id = c.company_id
            JOIN stock_prices prev ON c.company_id = prev.company_id AND prev.year = ?2 - 1
            JOIN stock_prices curr ON c.company_id = curr.company_id AND curr.year = ?2
            WHERE sc.session_id = ?1
            ORDER BY c.company_id
            "#,
        )
        .bind(session_id)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to get price changes: {}", e)))
    }

    pub async fn holdings(&self, session_id: i64) -> Result<Vec<Holding>, StoreError> {
        let records = sqlx::query_as::<_, HoldingRecord>(
            "SELECT * FROM holdings WHERE session_id = ?1 ORDER BY company_id",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to get holdings: {}", e)))?;

        Ok(records.into_iter().map(Holding::from).collect())
    }

    pub async fn holding_for(
        &self,
        session_id: i64,
        company_id: i64,
    ) -> Result<Option<Holding>, StoreError> {
        let record = sqlx::query_as::<_, HoldingRecord>(
            "SELECT * FROM holdings WHERE session_id = ?1 AND company_id = ?2",
        )
        .bind(session_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to get holding: {}", e)))?;

        Ok(record.map(Holding::from))
    }

    /// Apply one trade: swap the balance and upsert the ledger row as one
    /// unit. Returns `Ok(false)` when the balance moved under the caller
    /// (lost race) and nothing was changed.
    pub async fn apply_trade(&self, update: TradeUpdate) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let swapped = sqlx::query(
            r#"
            UPDATE game_sessions
            SET current_balance = ?1
            WHERE session_id = ?2 AND current_balance = ?3 AND status = 'active'
            "#,
        )
        .bind(update.new_balance)
        .bind(update.session_id)
        .bind(update.expected_balance)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to update balance for session {}: {}", update.session_id, e);
            StoreError::Query(format!("Failed to update balance: {}", e))
        })?
        .rows_affected();

        if swapped == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if update.new_quantity == 0 {
            sqlx::query("DELETE FROM holdings WHERE session_id = ?1 AND company_id = ?2")
                .bind(update.session_id)
                .bind(update.company_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Query(format!("Failed to clear holding: {}", e)))?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO holdings (session_id, company_id, year, quantity, avg_price)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(session_id, company_id) DO UPDATE SET
                    year = excluded.year,
                    quantity = excluded.quantity,
                    avg_price = excluded.avg_price
                "#,
            )
            .bind(update.session_id)
            .bind(update.company_id)
            .bind(update.year)
            .bind(update.new_quantity)
            .bind(update.avg_price)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to upsert holding: {}", e)))?;
        }

        tx.commit().await?;

        debug!(
            "Applied trade on session {}: balance {} -> {}",
            update.session_id, update.expected_balance, update.new_balance
        );
        Ok(true)
    }

    /// Compare-and-swap balance debit without touching the ledger
    /// (news charged against session cash).
    pub async fn debit_balance(
        &self,
        session_id: i64,
        expected_balance: f64,
        new_balance: f64,
    ) -> Result<bool, StoreError> {
        let swapped = sqlx::query(
            r#"
            UPDATE game_sessions
            SET current_balance = ?1
            WHERE session_id = ?2 AND current_balance = ?3 AND status = 'active'
            "#,
        )
        .bind(new_balance)
        .bind(session_id)
        .bind(expected_balance)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to debit balance: {}", e)))?
        .rows_affected();

        Ok(swapped > 0)
    }

    /// Roll the session into the next year: set year and valuation balance,
    /// clear the ledger. CAS on the year and the balance the caller valued
    /// against, so a trade that landed after the valuation read loses the
    /// race instead of being overwritten.
    pub async fn advance_turn(
        &self,
        session_id: i64,
        expected_year: i64,
        expected_balance: f64,
        next_year: i64,
        new_balance: f64,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let swapped = sqlx::query(
            r#"
            UPDATE game_sessions
            SET current_year = ?1, current_balance = ?2
            WHERE session_id = ?3 AND current_year = ?4 AND current_balance = ?5
              AND status = 'active'
            "#,
        )
        .bind(next_year)
        .bind(new_balance)
        .bind(session_id)
        .bind(expected_year)
        .bind(expected_balance)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to advance session {}: {}", session_id, e);
            StoreError::Query(format!("Failed to advance turn: {}", e))
        })?
        .rows_affected();

        if swapped == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM holdings WHERE session_id = ?1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to reset holdings: {}", e)))?;

        tx.commit().await?;

        debug!("Advanced session {} to year {}", session_id, next_year);
        Ok(true)
    }

    /// Terminal transition: complete the session and fold the profit rate
    /// into the owner's aggregate stats, all in one transaction. The CAS on
    /// year, balance and status guarantees the stats update happens exactly
    /// once and never against a valuation computed from a stale read.
    pub async fn complete(
        &self,
        session_id: i64,
        user_id: i64,
        expected_year: i64,
        expected_balance: f64,
        final_year: i64,
        final_balance: f64,
        completed_at: DateTime<Utc>,
        profit_rate: f64,
        initial_points: f64,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let swapped = sqlx::query(
            r#"
            UPDATE game_sessions
            SET status = 'completed', current_year = ?1, current_balance = ?2, completed_at = ?3
            WHERE session_id = ?4 AND current_year = ?5 AND current_balance = ?6
              AND status = 'active'
            "#,
        )
        .bind(final_year)
        .bind(final_balance)
        .bind(completed_at)
        .bind(session_id)
        .bind(expected_year)
        .bind(expected_balance)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to complete session {}: {}", session_id, e);
            StoreError::Query(format!("Failed to complete session: {}", e))
        })?
        .rows_affected();

        if swapped == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM holdings WHERE session_id = ?1")
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to reset holdings: {}", e)))?;

        // Running-mean incorporation; all right-hand references evaluate
        // against the pre-update row.
        sqlx::query(
            r#"
            INSERT INTO user_stats (user_id, total_games, best_profit_rate, cumulative_profit_rate, points)
            VALUES (?1, 1, ?2, ?2, ?3)
            ON CONFLICT(user_id) DO UPDATE SET
                best_profit_rate = MAX(COALESCE(user_stats.best_profit_rate, ?2), ?2),
                cumulative_profit_rate =
                    (user_stats.cumulative_profit_rate * user_stats.total_games + ?2)
                    / (user_stats.total_games + 1),
                total_games = user_stats.total_games + 1
            "#,
        )
        .bind(user_id)
        .bind(profit_rate)
        .bind(initial_points)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to record stats for user {}: {}", user_id, e);
            StoreError::Query(format!("Failed to record user stats: {}", e))
        })?;

        tx.commit().await?;

        debug!(
            "Completed session {} (profit rate {:.2}%)",
            session_id, profit_rate
        );
        Ok(true)
    }

    /// Last completed games for a user, newest first.
    pub async fn history_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<GameHistoryRecord>, StoreError> {
        sqlx::query_as::<_, GameHistoryRecord>(
            r#"
            SELECT
                session_id,
                start_balance,
                current_balance AS final_balance,
                (current_balance - start_balance) / start_balance * 100.0 AS profit_rate,
                created_at,
                completed_at
            FROM game_sessions
            WHERE user_id = ?1 AND status = 'completed'
            ORDER BY completed_at DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to get game history: {}", e)))
    }

    /// Best realized final balance across a user's completed games.
    pub async fn best_final_balance(&self, user_id: i64) -> Result<Option<f64>, StoreError> {
        let row = sqlx::query(
            "SELECT MAX(current_balance) AS best FROM game_sessions \
             WHERE user_id = ?1 AND status = 'completed'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to get best balance: {}", e)))?;

        Ok(row.get("best"))
    }
}

/// Price timeline repository
pub struct PriceRepository {
    pool: DbPool,
}

impl PriceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, company_id: i64, year: i64) -> Result<Option<f64>, StoreError> {
        let record = sqlx::query_as::<_, PriceRecord>(
            "SELECT * FROM stock_prices WHERE company_id = ?1 AND year = ?2",
        )
        .bind(company_id)
        .bind(year)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to get price: {}", e)))?;

        Ok(record.map(|r| r.price))
    }

    /// First-writer-wins insert. Concurrent first accesses to the same
    /// (company, year) all read back the single winning value.
    pub async fn set_if_absent(
        &self,
        company_id: i64,
        year: i64,
        price: f64,
    ) -> Result<f64, StoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO stock_prices (company_id, year, price) VALUES (?1, ?2, ?3)",
        )
        .bind(company_id)
        .bind(year)
        .bind(price)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to insert price: {}", e)))?;

        self.get(company_id, year).await?.ok_or_else(|| {
            StoreError::Integrity(format!(
                "price for company {} year {} missing after insert",
                company_id, year
            ))
        })
    }
}

/// News repository
pub struct NewsRepository {
    pool: DbPool,
}

impl NewsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get(
        &self,
        company_id: i64,
        year: i64,
    ) -> Result<Option<NewsRecord>, StoreError> {
        sqlx::query_as::<_, NewsRecord>(
            "SELECT * FROM news WHERE company_id = ?1 AND year = ?2",
        )
        .bind(company_id)
        .bind(year)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to get news: {}", e)))
    }

    pub async fn create(
        &self,
        company_id: i64,
        year: i64,
        headline: &str,
        content: &str,
    ) -> Result<NewsRecord, StoreError> {
        sqlx::query_as::<_, NewsRecord>(
            r#"
            INSERT INTO news (company_id, year, headline, content)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(year)
        .bind(headline)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to create news: {}", e)))
    }
}

/// Per-user aggregate stats repository
pub struct UserStatsRepository {
    pool: DbPool,
}

impl UserStatsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fetch the stats row, creating it with the initial point balance on
    /// first touch.
    pub async fn ensure(
        &self,
        user_id: i64,
        initial_points: f64,
    ) -> Result<UserStatsRecord, StoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO user_stats (user_id, total_games, cumulative_profit_rate, points) \
             VALUES (?1, 0, 0.0, ?2)",
        )
        .bind(user_id)
        .bind(initial_points)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to ensure user stats: {}", e)))?;

        self.get(user_id).await?.ok_or_else(|| {
            StoreError::Integrity(format!("user stats for {} missing after insert", user_id))
        })
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<UserStatsRecord>, StoreError> {
        sqlx::query_as::<_, UserStatsRecord>("SELECT * FROM user_stats WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to get user stats: {}", e)))
    }

    /// Compare-and-swap point debit (news charged against user points).
    pub async fn debit_points(
        &self,
        user_id: i64,
        expected_points: f64,
        new_points: f64,
    ) -> Result<bool, StoreError> {
        let swapped = sqlx::query(
            "UPDATE user_stats SET points = ?1 WHERE user_id = ?2 AND points = ?3",
        )
        .bind(new_points)
        .bind(user_id)
        .bind(expected_points)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to debit points: {}", e)))?
        .rows_affected();

        Ok(swapped > 0)
    }
}

/// Leaderboard repository. Read-only over completed sessions and user
/// aggregates; active sessions are never eligible.
pub struct RankingRepository {
    pool: DbPool,
}

impl RankingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn top_sessions_by_balance(
        &self,
        n: i64,
    ) -> Result<Vec<BalanceRankRecord>, StoreError> {
        sqlx::query_as::<_, BalanceRankRecord>(
            r#"
            SELECT session_id, user_id, current_balance AS final_balance, completed_at
            FROM game_sessions
            WHERE status = 'completed'
            ORDER BY current_balance DESC
            LIMIT ?1
            "#,
        )
        .bind(n)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to get balance ranking: {}", e)))
    }

    pub async fn top_users_by_best_rate(
        &self,
        n: i64,
    ) -> Result<Vec<RateRankRecord>, StoreError> {
        sqlx::query_as::<_, RateRankRecord>(
            r#"
            SELECT user_id, best_profit_rate AS profit_rate, total_games
            FROM user_stats
            WHERE total_games > 0 AND best_profit_rate IS NOT NULL
            ORDER BY best_profit_rate DESC
            LIMIT ?1
            "#,
        )
        .bind(n)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to get best-rate ranking: {}", e)))
    }

    pub async fn top_users_by_cumulative_rate(
        &self,
        n: i64,
    ) -> Result<Vec<RateRankRecord>, StoreError> {
        sqlx::query_as::<_, RateRankRecord>(
            r#"
            SELECT user_id, cumulative_profit_rate AS profit_rate, total_games
            FROM user_stats
            WHERE total_games > 0
            ORDER BY cumulative_profit_rate DESC
            LIMIT ?1
            "#,
        )
        .bind(n)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to get cumulative ranking: {}", e)))
    }
}
