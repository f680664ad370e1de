use std::fmt::Write;

use tokio_postgres::types::ToSql;

pub type SqlArg = Box<dyn ToSql + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Ordering {
    Ascending,
    Descending,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Comparison {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Any,
    ILike,
}

impl Comparison {
    fn render(self, column: &str, index: usize) -> String {
        use self::Comparison::*;

        match self {
            Eq => format!("{} = ${}", column, index),
            NotEq => format!("{} <> ${}", column, index),
            Lt => format!("{} < ${}", column, index),
            Lte => format!("{} <= ${}", column, index),
            Gt => format!("{} > ${}", column, index),
            Gte => format!("{} >= ${}", column, index),
            Any => format!("{} = ANY(${})", column, index),
            ILike => format!("{} ILIKE ${}", column, index),
        }
    }
}

enum Condition {
    Compare(String, Comparison, SqlArg),
    IsNull(String),
    IsNotNull(String),
}

/// `ILIKE` pattern matching `term` anywhere; wildcards typed by the user
/// are matched literally.
pub fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if c == '%' || c == '_' || c == '\\' {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Builds the `WHERE` / `ORDER BY` / `LIMIT` tail shared by select, update and delete.
pub struct FilteredOperationBuilder {
    table: &'static str,
    conditions: Vec<Condition>,
    ordering: Vec<(String, Ordering)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl FilteredOperationBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            conditions: Default::default(),
            ordering: vec![],
            limit: None,
            offset: None,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn with_filter<C: Into<String>, V: ToSql + Send + Sync + 'static>(self, column: C, value: V) -> Self {
        self.with_comparison(column, Comparison::Eq, value)
    }

    pub fn with_comparison<C: Into<String>, V: ToSql + Send + Sync + 'static>(mut self, column: C, op: Comparison, value: V) -> Self {
        self.conditions.push(Condition::Compare(column.into(), op, Box::new(value)));
        self
    }

    pub fn with_null<C: Into<String>>(mut self, column: C, is_null: bool) -> Self {
        self.conditions.push(if is_null {
            Condition::IsNull(column.into())
        } else {
            Condition::IsNotNull(column.into())
        });
        self
    }

    /// Orderings apply in the order they are added.
    pub fn with_ordering<C: Into<String>>(mut self, column: C, ordering: Ordering) -> Self {
        self.ordering.push((column.into(), ordering));
        self
    }

    pub fn with_limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: Option<i64>) -> Self {
        self.offset = offset;
        self
    }

    fn write_where(conditions: Vec<Condition>, query: &mut String, args: &mut Vec<SqlArg>) {
        for (i, condition) in conditions.into_iter().enumerate() {
            query.push_str(if i == 0 { " WHERE " } else { " AND " });
            match condition {
                Condition::Compare(column, op, arg) => {
                    args.push(arg);
                    query.push_str(&op.render(&column, args.len()));
                }
                Condition::IsNull(column) => {
                    let _ = write!(query, "{} IS NULL", column);
                }
                Condition::IsNotNull(column) => {
                    let _ = write!(query, "{} IS NOT NULL", column);
                }
            }
        }
    }

    pub fn build_select(self) -> (String, Vec<SqlArg>) {
        let mut args = vec![];
        let mut query = format!("SELECT * FROM {}", self.table);
        Self::write_where(self.conditions, &mut query, &mut args);
        if !self.ordering.is_empty() {
            let terms = self
                .ordering
                .iter()
                .map(|(column, ordering)| {
                    format!(
                        "{} {}",
                        column,
                        match ordering {
                            Ordering::Ascending => "ASC",
                            Ordering::Descending => "DESC",
                        }
                    )
                })
                .collect::<Vec<_>>();
            let _ = write!(query, " ORDER BY {}", terms.join(", "));
        }
        if let Some(limit) = self.limit {
            let _ = write!(query, " LIMIT {}", limit);
        }
        if let Some(offset) = self.offset {
            let _ = write!(query, " OFFSET {}", offset);
        }
        query.push(';');

        (query, args)
    }

    pub fn build_count(self) -> (String, Vec<SqlArg>) {
        let mut args = vec![];
        let mut query = format!("SELECT COUNT(*) FROM {}", self.table);
        Self::write_where(self.conditions, &mut query, &mut args);
        query.push(';');

        (query, args)
    }

    pub fn build_delete(self) -> (String, Vec<SqlArg>) {
        let mut args = vec![];
        let mut query = format!("DELETE FROM {}", self.table);
        Self::write_where(self.conditions, &mut query, &mut args);
        query.push_str(" RETURNING *;");

        (query, args)
    }
}

pub struct InsertBuilder {
    table: &'static str,
    values: Vec<(String, SqlArg)>,
}

impl InsertBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            values: Default::default(),
        }
    }

    pub fn with_arg<C: Into<String>, V: ToSql + Send + Sync + 'static>(mut self, column: C, value: V) -> Self {
        self.values.push((column.into(), Box::new(value)));
        self
    }

    pub fn build(self) -> (String, Vec<SqlArg>) {
        let mut columns = Vec::with_capacity(self.values.len());
        let mut placeholders = Vec::with_capacity(self.values.len());
        let mut args = Vec::with_capacity(self.values.len());
        for (i, (column, arg)) in self.values.into_iter().enumerate() {
            columns.push(column);
            placeholders.push(format!("${}", i + 1));
            args.push(arg);
        }

        (
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *;",
                self.table,
                columns.join(", "),
                placeholders.join(", ")
            ),
            args,
        )
    }
}

pub struct UpdateBuilder {
    filter: FilteredOperationBuilder,
    values: Vec<(String, SqlArg)>,
}

impl From<FilteredOperationBuilder> for UpdateBuilder {
    fn from(filter: FilteredOperationBuilder) -> Self {
        Self {
            filter,
            values: Default::default(),
        }
    }
}

impl UpdateBuilder {
    pub fn with_value<C: Into<String>, V: ToSql + Send + Sync + 'static>(mut self, column: C, value: V) -> Self {
        self.values.push((column.into(), Box::new(value)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the filter back when there is nothing to set.
    pub fn build(self) -> Result<(String, Vec<SqlArg>), FilteredOperationBuilder> {
        if self.values.is_empty() {
            return Err(self.filter);
        }

        let mut args = vec![];
        let mut query = format!("UPDATE {} SET ", self.filter.table);
        for (i, (column, arg)) in self.values.into_iter().enumerate() {
            if i > 0 {
                query.push_str(", ");
            }
            args.push(arg);
            let _ = write!(query, "{} = ${}", column, args.len());
        }
        FilteredOperationBuilder::write_where(self.filter.conditions, &mut query, &mut args);
        query.push_str(" RETURNING *;");

        Ok((query, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_numbers_placeholders_from_one() {
        let (query, args) = FilteredOperationBuilder::new("orders")
            .with_filter("status", "pending".to_string())
            .with_comparison("created_at", Comparison::Gte, 10i64)
            .with_null("payment_intent_id", false)
            .with_ordering("created_at", Ordering::Descending)
            .with_limit(Some(20))
            .with_offset(Some(40))
            .build_select();

        assert_eq!(
            query,
            "SELECT * FROM orders WHERE status = $1 AND created_at >= $2 AND payment_intent_id IS NOT NULL ORDER BY created_at DESC LIMIT 20 OFFSET 40;"
        );
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn search_terms_escape_wildcards() {
        assert_eq!(contains_pattern("durand"), "%durand%");
        assert_eq!(contains_pattern("100%_sur"), "%100\\%\\_sur%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn orderings_accumulate() {
        let (query, _) = FilteredOperationBuilder::new("time_slots")
            .with_ordering("slot_date", Ordering::Ascending)
            .with_ordering("start_time", Ordering::Ascending)
            .build_select();

        assert_eq!(query, "SELECT * FROM time_slots ORDER BY slot_date ASC, start_time ASC;");
    }

    #[test]
    fn insert_lists_columns_in_order() {
        let (query, args) = InsertBuilder::new("waste_types")
            .with_arg("name", "Gravats".to_string())
            .with_arg("active", true)
            .build();

        assert_eq!(query, "INSERT INTO waste_types (name, active) VALUES ($1, $2) RETURNING *;");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn update_continues_numbering_into_where() {
        let (query, args) = UpdateBuilder::from(FilteredOperationBuilder::new("users").with_filter("id", 7i32))
            .with_value("role", "admin".to_string())
            .with_value("login_attempts", 0i32)
            .build()
            .map_err(|_| ())
            .unwrap();

        assert_eq!(query, "UPDATE users SET role = $1, login_attempts = $2 WHERE id = $3 RETURNING *;");
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn empty_update_gives_filter_back() {
        let b = UpdateBuilder::from(FilteredOperationBuilder::new("users").with_filter("id", 7i32));
        assert!(b.is_empty());
        assert!(b.build().is_err());
    }

    #[test]
    fn delete_without_filters() {
        let (query, args) = FilteredOperationBuilder::new("cart_items").build_delete();
        assert_eq!(query, "DELETE FROM cart_items RETURNING *;");
        assert!(args.is_empty());
    }
}
