use async_trait::async_trait;
use derive_new::new;
use kernel::{
    model::{
        id::{BookId, LoanId, UserId},
        loan::{
            event::{CreateLoan, TransitionLoan},
            LoanCommit, LoanRecord, LoanState, LoanTimestamp,
        },
        notification::{event::CreateNotification, NotificationKind},
    },
    repository::loan::LoanRepository,
};
use shared::error::{AppError, AppResult};

use super::notification::{acknowledge_pending, insert_notification};
use crate::database::{
    model::loan::{LoanRow, LOAN_COLUMNS},
    pg_error_code, ConnectionPool, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION,
};

#[derive(new)]
pub struct LoanRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl LoanRepository for LoanRepositoryImpl {
    async fn create(&self, event: CreateLoan) -> AppResult<LoanCommit> {
        let mut tx = self.db.begin().await?;

        // 進行中の貸出の重複は部分一意インデックスが弾く
        let sql = format!(
            r#"
                INSERT INTO loans (loan_id, book_id, owner_id, borrower_id, state, requested_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {LOAN_COLUMNS}
            "#
        );
        let res = sqlx::query_as::<_, LoanRow>(&sql)
            .bind(LoanId::new())
            .bind(event.book_id)
            .bind(event.owner_id)
            .bind(event.borrower_id)
            .bind(LoanState::Requested.as_ref())
            .bind(event.requested_at)
            .fetch_optional(&mut *tx)
            .await;

        let loan: LoanRecord = match res {
            Ok(Some(row)) => row.try_into()?,
            Ok(None) => {
                return Err(AppError::NoRowAffectedError(
                    "No loan record has been created".into(),
                ))
            }
            Err(e) => {
                return match pg_error_code(&e).as_deref() {
                    Some(UNIQUE_VIOLATION) => Err(AppError::ActiveLoanExists),
                    Some(FOREIGN_KEY_VIOLATION) => Err(AppError::EntityNotFound(format!(
                        "book {} or its users do not exist",
                        event.book_id
                    ))),
                    _ => Err(AppError::SpecificOperationError(e)),
                }
            }
        };

        let notification =
            insert_notification(&mut tx, &CreateNotification::announcing(&loan, event.requested_at)?)
                .await?;
        tx.commit().await.map_err(AppError::TransactionError)?;

        Ok(LoanCommit { loan, notification })
    }

    async fn get(&self, loan_id: LoanId) -> AppResult<LoanRecord> {
        let sql = format!("SELECT {LOAN_COLUMNS} FROM loans WHERE loan_id = $1");
        sqlx::query_as::<_, LoanRow>(&sql)
            .bind(loan_id)
            .fetch_optional(self.db.inner_ref())
            .await
            .map_err(AppError::SpecificOperationError)?
            .ok_or_else(|| AppError::EntityNotFound(format!("loan {loan_id} not found")))?
            .try_into()
    }

    async fn transition(&self, event: TransitionLoan) -> AppResult<LoanCommit> {
        let column = match event.stamp {
            LoanTimestamp::Confirmed => "confirmed_at",
            LoanTimestamp::ReturnRequested => "return_requested_at",
            LoanTimestamp::Returned => "returned_at",
            LoanTimestamp::Cancelled => "cancelled_at",
        };
        let mut tx = self.db.begin().await?;

        // 状態の比較と更新をひとつの UPDATE で行う。
        // 時刻は一度だけ設定し、既存のどの時刻よりも前にはしない（GREATEST は NULL を無視する）
        let sql = format!(
            r#"
                UPDATE loans
                SET state = $3,
                    {column} = COALESCE(
                        {column},
                        GREATEST($4, requested_at, confirmed_at, return_requested_at, returned_at, cancelled_at)
                    )
                WHERE loan_id = $1 AND state = $2
                RETURNING {LOAN_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, LoanRow>(&sql)
            .bind(event.loan_id)
            .bind(event.expected.as_ref())
            .bind(event.next.as_ref())
            .bind(event.at)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::SpecificOperationError)?;

        let Some(row) = row else {
            // 行が無いのか、状態が変わっていたのかを区別する
            drop(tx);
            let current = self.get(event.loan_id).await?;
            return Err(AppError::StateConflict(format!(
                "expected {} but loan {} is {}",
                event.expected, current.id, current.state
            )));
        };
        let loan: LoanRecord = row.try_into()?;

        // 判断の済んだ通知の既読化と、遷移先を知らせる通知の追加は同じトランザクションで行う
        if let Some(resolved) = NotificationKind::resolved_on(loan.state) {
            acknowledge_pending(&mut tx, loan.id, resolved.recipient(&loan), resolved).await?;
        }
        let notification =
            insert_notification(&mut tx, &CreateNotification::announcing(&loan, event.at)?).await?;
        tx.commit().await.map_err(AppError::TransactionError)?;

        Ok(LoanCommit { loan, notification })
    }

    async fn find_active_by_book_id(&self, book_id: BookId) -> AppResult<Option<LoanRecord>> {
        let sql = format!(
            r#"
                SELECT {LOAN_COLUMNS} FROM loans
                WHERE book_id = $1
                  AND state IN ('Requested', 'Confirmed', 'ReturnRequested')
            "#
        );
        sqlx::query_as::<_, LoanRow>(&sql)
            .bind(book_id)
            .fetch_optional(self.db.inner_ref())
            .await
            .map_err(AppError::SpecificOperationError)?
            .map(LoanRecord::try_from)
            .transpose()
    }

    async fn find_by_user_id(&self, user_id: UserId) -> AppResult<Vec<LoanRecord>> {
        let sql = format!(
            r#"
                SELECT {LOAN_COLUMNS} FROM loans
                WHERE owner_id = $1 OR borrower_id = $1
                ORDER BY requested_at DESC
            "#
        );
        sqlx::query_as::<_, LoanRow>(&sql)
            .bind(user_id)
            .fetch_all(self.db.inner_ref())
            .await
            .map_err(AppError::SpecificOperationError)?
            .into_iter()
            .map(LoanRecord::try_from)
            .collect()
    }
}
