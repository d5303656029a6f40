//! Collection query builder using SeaQuery.
//!
//! Generates PostgreSQL for a bound request:
//! - Column projection (id, subtype, declared fields)
//! - Fixed conditions and bound exposed filters
//! - Sorts with an id tiebreaker for stable paging
//! - LIMIT/OFFSET and a separate COUNT query
//!
//! Table and column names are registry-validated identifiers; filter values
//! are always passed as values, never spliced into SQL text.

use sea_query::{
    Alias, Asterisk, Expr, ExprTrait, Order, PostgresQueryBuilder, Query, SelectStatement,
    SimpleExpr, Value,
};

use crate::collection::{
    BoundFilters, FilterOperator, FilterValue, QueryDefinition, SortDirection,
};

/// Query builder for collection queries.
pub struct CollectionQueryBuilder<'a> {
    definition: &'a QueryDefinition,
    filters: &'a BoundFilters,
}

impl<'a> CollectionQueryBuilder<'a> {
    pub fn new(definition: &'a QueryDefinition, filters: &'a BoundFilters) -> Self {
        Self {
            definition,
            filters,
        }
    }

    /// Build the main SELECT. `limit == None` returns every row.
    pub fn build(&self, offset: u64, limit: Option<u32>) -> String {
        let mut query = Query::select();

        self.add_select_fields(&mut query);
        query.from(Alias::new(&self.definition.base_table));
        self.add_conditions(&mut query);
        self.add_sorts(&mut query);

        if let Some(limit) = limit {
            query.limit(u64::from(limit));
            query.offset(offset);
        }

        query.to_string(PostgresQueryBuilder)
    }

    /// Build a COUNT query for total results.
    pub fn build_count(&self) -> String {
        let mut query = Query::select();

        query.expr(Expr::col(Asterisk).count());
        query.from(Alias::new(&self.definition.base_table));
        self.add_conditions(&mut query);

        query.to_string(PostgresQueryBuilder)
    }

    fn add_select_fields(&self, query: &mut SelectStatement) {
        let table = &self.definition.base_table;

        if self.definition.fields.is_empty() {
            query.column((Alias::new(table), Asterisk));
            return;
        }

        let mut columns = vec![&self.definition.id_field, &self.definition.subtype_field];
        for field in &self.definition.fields {
            if !columns.contains(&field) {
                columns.push(field);
            }
        }
        for column in columns {
            query.column((Alias::new(table), Alias::new(column)));
        }
    }

    fn add_conditions(&self, query: &mut SelectStatement) {
        for condition in &self.definition.conditions {
            query.and_where(self.condition_expr(
                &condition.field,
                condition.operator,
                &condition.value,
            ));
        }
        for filter in self.filters.iter() {
            query.and_where(self.condition_expr(&filter.field, filter.operator, &filter.value));
        }
    }

    fn condition_expr(
        &self,
        field: &str,
        operator: FilterOperator,
        value: &FilterValue,
    ) -> SimpleExpr {
        let column = self.field_expr(field);

        match operator {
            FilterOperator::Equals => column.eq(sql_value(value)),
            FilterOperator::NotEquals => column.ne(sql_value(value)),
            FilterOperator::GreaterThan => column.gt(sql_value(value)),
            FilterOperator::LessThan => column.lt(sql_value(value)),
            FilterOperator::GreaterOrEqual => column.gte(sql_value(value)),
            FilterOperator::LessOrEqual => column.lte(sql_value(value)),
            FilterOperator::Contains => {
                self.ilike(field, format!("%{}%", escape_like_wildcards(&value.as_string())))
            }
            FilterOperator::StartsWith => {
                self.ilike(field, format!("{}%", escape_like_wildcards(&value.as_string())))
            }
            FilterOperator::EndsWith => {
                self.ilike(field, format!("%{}", escape_like_wildcards(&value.as_string())))
            }
        }
    }

    /// Case-insensitive match against the text form of a column.
    fn ilike(&self, field: &str, pattern: String) -> SimpleExpr {
        Expr::cust_with_values(
            format!(
                "\"{}\".\"{field}\"::text ILIKE $1",
                self.definition.base_table
            ),
            [pattern],
        )
    }

    fn field_expr(&self, field: &str) -> SimpleExpr {
        Expr::col((
            Alias::new(&self.definition.base_table),
            Alias::new(field),
        ))
        .into()
    }

    fn add_sorts(&self, query: &mut SelectStatement) {
        let table = &self.definition.base_table;

        for sort in &self.definition.sorts {
            let order = match sort.direction {
                SortDirection::Asc => Order::Asc,
                SortDirection::Desc => Order::Desc,
            };
            query.order_by((Alias::new(table), Alias::new(&sort.field)), order);
        }

        if !self
            .definition
            .sorts
            .iter()
            .any(|sort| sort.field == self.definition.id_field)
        {
            query.order_by(
                (Alias::new(table), Alias::new(&self.definition.id_field)),
                Order::Asc,
            );
        }
    }
}

fn sql_value(value: &FilterValue) -> Value {
    match value {
        FilterValue::String(s) => s.clone().into(),
        FilterValue::Integer(i) => (*i).into(),
        FilterValue::Float(f) => (*f).into(),
        FilterValue::Boolean(b) => (*b).into(),
    }
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
