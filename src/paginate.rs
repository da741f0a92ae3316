/*!
 * Diesel plugin for pagination
 * https://github.com/diesel-rs/diesel/blob/master/examples/postgres/advanced-blog-cli/src/pagination.rs
 *
 * Pages are ordered on the outer query by a unique key column of the inner one, so that
 * consecutive pages neither skip nor repeat rows.
 */

use diesel::{pg::Pg, prelude::*, query_builder::*, sql_types::BigInt};
use diesel_async::{methods::LoadQuery, AsyncPgConnection, RunQueryDsl};

const DEFAULT_PER_PAGE: i64 = 100;

pub trait Paginate: Sized {
    /// Pages through the query ordered by `key`, a column name the query selects and that is unique
    fn paginate_by(self, key: &'static str, page: i64) -> Paginated<Self>;
}

impl<T> Paginate for T {
    fn paginate_by(self, key: &'static str, page: i64) -> Paginated<Self> {
        Paginated {
            query: self,
            key,
            per_page: DEFAULT_PER_PAGE,
            page,
            offset: (page - 1).max(0) * DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Paginated<T> {
    query: T,
    key: &'static str,
    page: i64,
    per_page: i64,
    offset: i64,
}

impl<'a, T: 'a> Paginated<T> {
    pub fn per_page(self, per_page: i64) -> Self {
        let per_page = per_page.max(1);
        Paginated { per_page, offset: (self.page - 1).max(0) * per_page, ..self }
    }

    /// Loads the page along with the row count of the whole, unpaginated, query
    pub async fn load_and_count<U>(self, conn: &mut AsyncPgConnection) -> QueryResult<(Vec<U>, i64)>
    where
        Self: LoadQuery<'a, AsyncPgConnection, (U, i64)>,
        U: Send + 'static,
    {
        let res: Vec<(U, i64)> = self.load(conn).await?;
        let count = res.get(0).map(|x| x.1).unwrap_or(0);
        let data = res.into_iter().map(|x| x.0).collect();
        Ok((data, count))
    }
}

// The key is part of the SQL text, so the statement can't be cached by type alone
impl<T> QueryId for Paginated<T> {
    type QueryId = ();
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl<T: Query> Query for Paginated<T> {
    type SqlType = (T::SqlType, BigInt);
}

impl<T> QueryFragment<Pg> for Paginated<T>
where
    T: QueryFragment<Pg>,
{
    fn walk_ast<'b>(&'b self, mut out: AstPass<'_, 'b, Pg>) -> QueryResult<()> {
        out.push_sql("SELECT *, COUNT(*) OVER () FROM (");
        self.query.walk_ast(out.reborrow())?;
        out.push_sql(") t ORDER BY t.");
        out.push_identifier(self.key)?;
        out.push_sql(" LIMIT ");
        out.push_bind_param::<BigInt, _>(&self.per_page)?;
        out.push_sql(" OFFSET ");
        out.push_bind_param::<BigInt, _>(&self.offset)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use diesel::debug_query;

    use super::*;
    use crate::schema::picks;

    #[test]
    fn orders_outer_query_by_key() {
        let query = picks::table.select((picks::id, picks::user_id)).paginate_by("id", 3).per_page(50);
        let sql = debug_query::<Pg, _>(&query).to_string();
        assert!(sql.starts_with("SELECT *, COUNT(*) OVER () FROM (SELECT"), "{sql}");
        assert!(sql.contains(r#") t ORDER BY t."id" LIMIT $1 OFFSET $2"#), "{sql}");
        assert!(sql.contains("[50, 100]"), "{sql}");
    }

    #[test]
    fn pages_start_at_one() {
        let query = picks::table.select(picks::id).paginate_by("id", 0).per_page(0);
        let sql = debug_query::<Pg, _>(&query).to_string();
        assert!(sql.contains("[1, 0]"), "{sql}");
    }
}
