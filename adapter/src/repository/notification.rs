use async_trait::async_trait;
use derive_new::new;
use kernel::{
    model::{
        id::{LoanId, NotificationId, UserId},
        notification::{
            event::CreateNotification, Notification, NotificationKind, NotificationView,
            PendingCursor,
        },
    },
    repository::notification::NotificationRepository,
};
use shared::error::{AppError, AppResult};
use sqlx::PgConnection;

use crate::database::{
    model::notification::{NotificationRow, NotificationViewRow, NOTIFICATION_COLUMNS},
    pg_error_code, ConnectionPool, FOREIGN_KEY_VIOLATION,
};

// 貸出の書き込みと同じトランザクションの中でも使う
pub(crate) async fn insert_notification(
    conn: &mut PgConnection,
    event: &CreateNotification,
) -> AppResult<Notification> {
    let sql = format!(
        r#"
            INSERT INTO notifications (notification_id, loan_id, recipient_id, kind, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {NOTIFICATION_COLUMNS}
        "#
    );
    let res = sqlx::query_as::<_, NotificationRow>(&sql)
        .bind(event.id)
        .bind(event.loan_id)
        .bind(event.recipient_id)
        .bind(event.kind.as_ref())
        .bind(event.created_at)
        .fetch_one(&mut *conn)
        .await;
    match res {
        Ok(row) => row.try_into(),
        Err(e) if pg_error_code(&e).as_deref() == Some(FOREIGN_KEY_VIOLATION) => Err(
            AppError::EntityNotFound(format!("loan {} not found", event.loan_id)),
        ),
        Err(e) => Err(AppError::SpecificOperationError(e)),
    }
}

// 該当する未確認の通知を確認済みにし、その件数を返す
pub(crate) async fn acknowledge_pending(
    conn: &mut PgConnection,
    loan_id: LoanId,
    recipient_id: UserId,
    kind: NotificationKind,
) -> AppResult<u64> {
    let res = sqlx::query(
        r#"
            UPDATE notifications SET acknowledged = TRUE
            WHERE loan_id = $1 AND recipient_id = $2 AND kind = $3
              AND NOT acknowledged
        "#,
    )
    .bind(loan_id)
    .bind(recipient_id)
    .bind(kind.as_ref())
    .execute(&mut *conn)
    .await
    .map_err(AppError::SpecificOperationError)?;
    Ok(res.rows_affected())
}

#[derive(new)]
pub struct NotificationRepositoryImpl {
    db: ConnectionPool,
}

impl NotificationRepositoryImpl {
    // 該当行が無ければ EntityNotFound。値が変わらなくても一致した行は数えられる
    async fn set_flag(&self, notification_id: NotificationId, column: &str) -> AppResult<()> {
        let sql = format!("UPDATE notifications SET {column} = TRUE WHERE notification_id = $1");
        let res = sqlx::query(&sql)
            .bind(notification_id)
            .execute(self.db.inner_ref())
            .await
            .map_err(AppError::SpecificOperationError)?;
        if res.rows_affected() < 1 {
            return Err(AppError::EntityNotFound(format!(
                "notification {notification_id} not found"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for NotificationRepositoryImpl {
    async fn append(&self, event: CreateNotification) -> AppResult<Notification> {
        let mut conn = self
            .db
            .inner_ref()
            .acquire()
            .await
            .map_err(AppError::SpecificOperationError)?;
        insert_notification(&mut conn, &event).await
    }

    async fn find_by_id(
        &self,
        notification_id: NotificationId,
    ) -> AppResult<Option<Notification>> {
        let sql =
            format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE notification_id = $1");
        sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(notification_id)
            .fetch_optional(self.db.inner_ref())
            .await
            .map_err(AppError::SpecificOperationError)?
            .map(Notification::try_from)
            .transpose()
    }

    async fn find_pending_by_loan(
        &self,
        loan_id: LoanId,
        recipient_id: UserId,
    ) -> AppResult<Vec<Notification>> {
        let sql = format!(
            r#"
                SELECT {NOTIFICATION_COLUMNS} FROM notifications
                WHERE loan_id = $1 AND recipient_id = $2
                  AND NOT acknowledged AND NOT archived
                ORDER BY created_at, notification_id
            "#
        );
        sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(loan_id)
            .bind(recipient_id)
            .fetch_all(self.db.inner_ref())
            .await
            .map_err(AppError::SpecificOperationError)?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }

    async fn mark_delivered(&self, notification_id: NotificationId) -> AppResult<()> {
        self.set_flag(notification_id, "delivered").await
    }

    async fn mark_acknowledged(&self, notification_id: NotificationId) -> AppResult<()> {
        self.set_flag(notification_id, "acknowledged").await
    }

    async fn archive(&self, notification_id: NotificationId) -> AppResult<()> {
        self.set_flag(notification_id, "archived").await
    }

    async fn resolve_pending(
        &self,
        resolved: NotificationKind,
        recipient_id: UserId,
        follow_up: CreateNotification,
    ) -> AppResult<Option<Notification>> {
        let mut tx = self.db.begin().await?;
        let flipped =
            acknowledge_pending(&mut tx, follow_up.loan_id, recipient_id, resolved).await?;
        if flipped == 0 {
            // 何も書き込んでいないのでそのまま破棄する
            return Ok(None);
        }
        let notification = insert_notification(&mut tx, &follow_up).await?;
        tx.commit().await.map_err(AppError::TransactionError)?;
        Ok(Some(notification))
    }

    async fn list_pending(
        &self,
        user_id: UserId,
        after: Option<PendingCursor>,
        limit: i64,
    ) -> AppResult<Vec<NotificationView>> {
        // 相手ユーザーは、受信者が貸し手なら借り手、そうでなければ貸し手
        let rows = sqlx::query_as::<_, NotificationViewRow>(
            r#"
                SELECT
                  n.notification_id, n.loan_id, n.recipient_id, n.kind, n.created_at,
                  n.delivered, n.acknowledged, n.archived,
                  b.title AS book_name,
                  u.name AS user_name,
                  u.profile_picture
                FROM notifications AS n
                INNER JOIN loans AS l ON l.loan_id = n.loan_id
                INNER JOIN books AS b ON b.book_id = l.book_id
                INNER JOIN users AS u ON u.user_id =
                  CASE WHEN n.recipient_id = l.owner_id THEN l.borrower_id ELSE l.owner_id END
                WHERE n.recipient_id = $1
                  AND NOT n.acknowledged AND NOT n.archived
                  AND ($2::timestamptz IS NULL OR (n.created_at, n.notification_id) > ($2, $3::uuid))
                ORDER BY n.created_at, n.notification_id
                LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(after.map(|c| c.created_at))
        .bind(after.map(|c| c.notification_id))
        .bind(limit)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        rows.into_iter().map(NotificationView::try_from).collect()
    }
}
