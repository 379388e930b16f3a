use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use super::PushStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{Device, DeviceFilter, Notification, Platform, SentState};

const UNIQUE_VIOLATION: &str = "23505";

const NOTIFICATION_COLUMNS: &str = r#"
    id, title, payload, active, sent, filter_platform, filter_user_id,
    date_created, date_started, date_finished
"#;

/// Postgres-backed store
///
/// Tables are created by `migrations/0001_push_dispatch.sql`.
pub struct PgPushStore {
    pool: PgPool,
}

impl PgPushStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn notification_from_row(row: &PgRow) -> StoreResult<Notification> {
        let sent: String = row.try_get("sent")?;
        let filter_platform: Option<i16> = row.try_get("filter_platform")?;

        Ok(Notification {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            payload: row.try_get("payload")?,
            active: row.try_get("active")?,
            sent: SentState::from_str(&sent)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown sent state {sent}")))?,
            filter: DeviceFilter {
                platform: filter_platform.map(platform_from_code).transpose()?,
                user_id: row.try_get("filter_user_id")?,
            },
            date_created: row.try_get("date_created")?,
            date_started: row.try_get("date_started")?,
            date_finished: row.try_get("date_finished")?,
        })
    }

    fn device_from_row(row: &PgRow) -> StoreResult<Device> {
        let platform: i16 = row.try_get("platform")?;
        Ok(Device {
            id: row.try_get("id")?,
            key: row.try_get("key")?,
            platform: platform_from_code(platform)?,
            user_id: row.try_get("user_id")?,
            date_created: row.try_get("date_created")?,
        })
    }
}

fn platform_from_code(code: i16) -> StoreResult<Platform> {
    Platform::from_code(code).ok_or_else(|| StoreError::Corrupt(format!("unknown platform {code}")))
}

/// Turn a unique-constraint failure into `UniquenessViolation`
fn map_unique(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::UniquenessViolation
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl PushStore for PgPushStore {
    async fn insert_notification(&self, notification: &Notification) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO push_notifications (
                id, title, payload, active, sent, filter_platform, filter_user_id,
                date_created, date_started, date_finished
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.title)
        .bind(&notification.payload)
        .bind(notification.active)
        .bind(notification.sent.as_str())
        .bind(notification.filter.platform.map(|p| p.code()))
        .bind(notification.filter.user_id)
        .bind(notification.date_created)
        .bind(notification.date_started)
        .bind(notification.date_finished)
        .execute(&self.pool)
        .await?;

        debug!(notification_id = %notification.id, "Notification inserted");
        Ok(())
    }

    async fn find_notification(&self, id: Uuid) -> StoreResult<Notification> {
        let query = format!("SELECT {NOTIFICATION_COLUMNS} FROM push_notifications WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;

        Self::notification_from_row(&row)
    }

    async fn save_notification(&self, notification: &Notification) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE push_notifications
            SET active = $2,
                sent = $3,
                date_started = $4,
                date_finished = $5
            WHERE id = $1
            "#,
        )
        .bind(notification.id)
        .bind(notification.active)
        .bind(notification.sent.as_str())
        .bind(notification.date_started)
        .bind(notification.date_finished)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn pending_notifications(&self) -> StoreResult<Vec<Notification>> {
        let query = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM push_notifications \
             WHERE sent = $1 AND active = TRUE ORDER BY date_created ASC"
        );
        let rows = sqlx::query(&query)
            .bind(SentState::NotSent.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::notification_from_row).collect()
    }

    async fn claim_pending(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE push_notifications
            SET sent = $2
            WHERE id = $1 AND sent = $3
            "#,
        )
        .bind(id)
        .bind(SentState::InProgress.as_str())
        .bind(SentState::NotSent.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_claim(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE push_notifications
            SET sent = $2
            WHERE id = $1 AND sent = $3 AND date_started IS NULL
            "#,
        )
        .bind(id)
        .bind(SentState::NotSent.as_str())
        .bind(SentState::InProgress.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_sent_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM push_notifications
            WHERE sent = $1 AND date_finished < $2
            "#,
        )
        .bind(SentState::Sent.as_str())
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_device(&self, device: &Device) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO push_devices (id, key, platform, user_id, date_created)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(device.id)
        .bind(&device.key)
        .bind(device.platform.code())
        .bind(device.user_id)
        .bind(device.date_created)
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;

        Ok(())
    }

    async fn find_device(&self, id: Uuid) -> StoreResult<Device> {
        let row = sqlx::query(
            "SELECT id, key, platform, user_id, date_created FROM push_devices WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;

        Self::device_from_row(&row)
    }

    async fn count_devices(&self, filter: &DeviceFilter) -> StoreResult<usize> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)::BIGINT FROM push_devices
            WHERE ($1::SMALLINT IS NULL OR platform = $1)
              AND ($2::UUID IS NULL OR user_id = $2)
            "#,
        )
        .bind(filter.platform.map(|p| p.code()))
        .bind(filter.user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as usize)
    }

    async fn filtered_devices(
        &self,
        filter: &DeviceFilter,
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<Device>> {
        let rows = sqlx::query(
            r#"
            SELECT id, key, platform, user_id, date_created FROM push_devices
            WHERE ($1::SMALLINT IS NULL OR platform = $1)
              AND ($2::UUID IS NULL OR user_id = $2)
            ORDER BY date_created ASC, id ASC
            OFFSET $3
            LIMIT $4
            "#,
        )
        .bind(filter.platform.map(|p| p.code()))
        .bind(filter.user_id)
        .bind(offset as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::device_from_row).collect()
    }

    async fn update_device_key(&self, id: Uuid, new_key: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE push_devices SET key = $2 WHERE id = $1")
            .bind(id)
            .bind(new_key)
            .execute(&self.pool)
            .await
            .map_err(map_unique)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_device(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM push_devices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_devices_by_key(&self, key: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM push_devices WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
