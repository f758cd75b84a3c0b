use kernel::model::{
    book::Book,
    id::{BookId, UserId},
    user::BookOwner,
};

#[derive(sqlx::FromRow)]
pub struct BookRow {
    pub book_id: BookId,
    pub title: String,
    pub owner_id: UserId,
    pub owner_name: String,
}

impl From<BookRow> for Book {
    fn from(value: BookRow) -> Self {
        let BookRow {
            book_id,
            title,
            owner_id,
            owner_name,
        } = value;
        Book {
            id: book_id,
            title,
            owner: BookOwner {
                id: owner_id,
                name: owner_name,
            },
        }
    }
}
