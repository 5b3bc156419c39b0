use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: Date,
    pub created_at: OffsetDateTime,
}

/// Mutable fields of a contact, used for both create and full-replace update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub birthday: Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    FirstName,
    LastName,
    Email,
}

impl SearchField {
    fn column(self) -> &'static str {
        match self {
            SearchField::FirstName => "first_name",
            SearchField::LastName => "last_name",
            SearchField::Email => "email",
        }
    }

    fn value(self, c: &Contact) -> &str {
        match self {
            SearchField::FirstName => &c.first_name,
            SearchField::LastName => &c.last_name,
            SearchField::Email => &c.email,
        }
    }

    /// Case-insensitive substring match, same semantics as the SQL `ILIKE`.
    pub fn matches(self, c: &Contact, needle: &str) -> bool {
        self.value(c)
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }
}

/// Month/day key of a date, `month * 100 + day` (March 14 → 314).
pub fn month_day_code(d: Date) -> i32 {
    i32::from(u8::from(d.month())) * 100 + i32::from(d.day())
}

/// Every method is scoped by the owning user; rows of other users are never
/// returned, updated or deleted.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn list(&self, user_id: Uuid, skip: i64, limit: i64) -> anyhow::Result<Vec<Contact>>;
    async fn get(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>>;
    async fn search(
        &self,
        user_id: Uuid,
        field: SearchField,
        needle: &str,
    ) -> anyhow::Result<Vec<Contact>>;
    /// Contacts whose birthday month/day code is one of `codes`.
    async fn by_birthday_codes(&self, user_id: Uuid, codes: &[i32]) -> anyhow::Result<Vec<Contact>>;
    async fn create(&self, user_id: Uuid, input: ContactInput) -> anyhow::Result<Contact>;
    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: ContactInput,
    ) -> anyhow::Result<Option<Contact>>;
    async fn remove(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>>;
}

#[derive(Clone)]
pub struct PgContactStore {
    db: PgPool,
}

impl PgContactStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

#[async_trait]
impl ContactStore for PgContactStore {
    async fn list(&self, user_id: Uuid, skip: i64, limit: i64) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, user_id, first_name, last_name, email, phone, birthday, created_at
            FROM contacts
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.db)
        .await
        .context("list contacts")?;
        Ok(rows)
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, user_id, first_name, last_name, email, phone, birthday, created_at
            FROM contacts
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("get contact")?;
        Ok(row)
    }

    async fn search(
        &self,
        user_id: Uuid,
        field: SearchField,
        needle: &str,
    ) -> anyhow::Result<Vec<Contact>> {
        // column comes from a closed enum, never from input
        let sql = format!(
            r#"
            SELECT id, user_id, first_name, last_name, email, phone, birthday, created_at
            FROM contacts
            WHERE user_id = $1 AND {} ILIKE $2 ESCAPE '\'
            ORDER BY created_at ASC, id ASC
            "#,
            field.column()
        );
        let rows = sqlx::query_as::<_, Contact>(&sql)
            .bind(user_id)
            .bind(like_pattern(needle))
            .fetch_all(&self.db)
            .await
            .with_context(|| format!("search contacts by {}", field.column()))?;
        Ok(rows)
    }

    async fn by_birthday_codes(&self, user_id: Uuid, codes: &[i32]) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(
            r#"
            SELECT id, user_id, first_name, last_name, email, phone, birthday, created_at
            FROM contacts
            WHERE user_id = $1
              AND (EXTRACT(MONTH FROM birthday)::int * 100 + EXTRACT(DAY FROM birthday)::int) = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(codes)
        .fetch_all(&self.db)
        .await
        .context("contacts by birthday")?;
        Ok(rows)
    }

    async fn create(&self, user_id: Uuid, input: ContactInput) -> anyhow::Result<Contact> {
        let row = sqlx::query_as::<_, Contact>(
            r#"
            INSERT INTO contacts (id, user_id, first_name, last_name, email, phone, birthday)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, user_id, first_name, last_name, email, phone, birthday, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(input.birthday)
        .fetch_one(&self.db)
        .await
        .context("insert contact")?;
        Ok(row)
    }

    async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: ContactInput,
    ) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(
            r#"
            UPDATE contacts
               SET first_name = $3, last_name = $4, email = $5, phone = $6, birthday = $7
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, first_name, last_name, email, phone, birthday, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.email)
        .bind(&input.phone)
        .bind(input.birthday)
        .fetch_optional(&self.db)
        .await
        .context("update contact")?;
        Ok(row)
    }

    async fn remove(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(
            r#"
            DELETE FROM contacts
             WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, first_name, last_name, email, phone, birthday, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("delete contact")?;
        Ok(row)
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryContactStore;
    use super::*;
    use time::macros::date;

    fn cristiano() -> ContactInput {
        ContactInput {
            first_name: "Cristiano".into(),
            last_name: "Ronaldo".into(),
            email: "cr7@gmail.com".into(),
            phone: "123123123".into(),
            birthday: date!(1985 - 03 - 14),
        }
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("cr7"), "%cr7%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern(r"a\b"), r"%a\\b%");
    }

    #[test]
    fn month_day_code_packs_month_and_day() {
        assert_eq!(month_day_code(date!(1985 - 03 - 14)), 314);
        assert_eq!(month_day_code(date!(2000 - 12 - 01)), 1201);
    }

    #[tokio::test]
    async fn create_then_get_round_trips_fields() {
        let store = MemoryContactStore::default();
        let owner = Uuid::new_v4();
        let created = store.create(owner, cristiano()).await.unwrap();
        let fetched = store.get(owner, created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.first_name, "Cristiano");
        assert_eq!(fetched.last_name, "Ronaldo");
        assert_eq!(fetched.email, "cr7@gmail.com");
        assert_eq!(fetched.phone, "123123123");
        assert_eq!(fetched.birthday, date!(1985 - 03 - 14));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let store = MemoryContactStore::default();
        let owner = Uuid::new_v4();
        store.create(owner, cristiano()).await.unwrap();
        for needle in ["cristi", "CRISTI", "isti"] {
            let found = store.search(owner, SearchField::FirstName, needle).await.unwrap();
            assert_eq!(found.len(), 1, "needle {needle}");
        }
        assert_eq!(store.search(owner, SearchField::LastName, "ron").await.unwrap().len(), 1);
        assert_eq!(store.search(owner, SearchField::Email, "cr7").await.unwrap().len(), 1);
        assert!(store
            .search(owner, SearchField::FirstName, "nobody")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn other_owners_never_see_or_touch_rows() {
        let store = MemoryContactStore::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let c = store.create(alice, cristiano()).await.unwrap();

        assert!(store.list(bob, 0, 100).await.unwrap().is_empty());
        assert!(store.get(bob, c.id).await.unwrap().is_none());
        assert!(store.search(bob, SearchField::FirstName, "cris").await.unwrap().is_empty());
        assert!(store.by_birthday_codes(bob, &[314]).await.unwrap().is_empty());
        assert!(store.update(bob, c.id, cristiano()).await.unwrap().is_none());
        assert!(store.remove(bob, c.id).await.unwrap().is_none());

        assert_eq!(store.list(alice, 0, 100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_replaces_mutable_fields() {
        let store = MemoryContactStore::default();
        let owner = Uuid::new_v4();
        let c = store.create(owner, cristiano()).await.unwrap();
        let mut input = cristiano();
        input.first_name = "Artur".into();
        input.birthday = date!(2023 - 03 - 15);
        let updated = store.update(owner, c.id, input).await.unwrap().unwrap();
        assert_eq!(updated.id, c.id);
        assert_eq!(updated.first_name, "Artur");
        assert_eq!(updated.birthday, date!(2023 - 03 - 15));
        assert_eq!(updated.created_at, c.created_at);
    }

    #[tokio::test]
    async fn delete_twice_returns_absence_second_time() {
        let store = MemoryContactStore::default();
        let owner = Uuid::new_v4();
        let c = store.create(owner, cristiano()).await.unwrap();
        assert!(store.remove(owner, c.id).await.unwrap().is_some());
        assert!(store.remove(owner, c.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_paginates_with_skip_and_limit() {
        let store = MemoryContactStore::default();
        let owner = Uuid::new_v4();
        for i in 0..5 {
            let mut input = cristiano();
            input.first_name = format!("C{i}");
            store.create(owner, input).await.unwrap();
        }
        let page = store.list(owner, 1, 2).await.unwrap();
        let names: Vec<_> = page.iter().map(|c| c.first_name.as_str()).collect();
        assert_eq!(names, ["C1", "C2"]);
    }
}
