use labtrack_core::ListParams;
use labtrack_sql::Value;

use crate::record::to_snake_case;

/// A single predicate on an extracted column.
#[derive(Debug, Clone)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    /// Case-insensitive substring match.
    Ilike(String, String),
    Gte(String, Value),
    Lte(String, Value),
    IsNull(String),
    NotNull(String),
    In(String, Vec<Value>),
    /// Matches if any nested filter matches.
    Or(Vec<Filter>),
}

impl Filter {
    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::Eq(c, _)
            | Filter::Neq(c, _)
            | Filter::Ilike(c, _)
            | Filter::Gte(c, _)
            | Filter::Lte(c, _)
            | Filter::IsNull(c)
            | Filter::NotNull(c)
            | Filter::In(c, _) => out.push(c.as_str()),
            Filter::Or(fs) => fs.iter().for_each(|f| f.collect_columns(out)),
        }
    }

    /// Render as SQL, appending bound values to `params`.
    fn render(&self, params: &mut Vec<Value>) -> String {
        match self {
            Filter::Eq(c, v) => format!("\"{c}\" = {}", bind(v.clone(), params)),
            Filter::Neq(c, v) => format!("\"{c}\" <> {}", bind(v.clone(), params)),
            Filter::Gte(c, v) => format!("\"{c}\" >= {}", bind(v.clone(), params)),
            Filter::Lte(c, v) => format!("\"{c}\" <= {}", bind(v.clone(), params)),
            Filter::IsNull(c) => format!("\"{c}\" IS NULL"),
            Filter::NotNull(c) => format!("\"{c}\" IS NOT NULL"),
            Filter::Ilike(c, term) => {
                let pattern = format!("%{}%", escape_like(term));
                format!("\"{c}\" LIKE {} ESCAPE '\\'", bind(Value::Text(pattern), params))
            }
            Filter::In(c, values) => {
                if values.is_empty() {
                    return "0 = 1".to_string();
                }
                let slots: Vec<String> = values.iter().map(|v| bind(v.clone(), params)).collect();
                format!("\"{c}\" IN ({})", slots.join(", "))
            }
            Filter::Or(fs) => {
                if fs.is_empty() {
                    return "0 = 1".to_string();
                }
                let parts: Vec<String> = fs.iter().map(|f| f.render(params)).collect();
                format!("({})", parts.join(" OR "))
            }
        }
    }
}

fn bind(v: Value, params: &mut Vec<Value>) -> String {
    params.push(v);
    format!("?{}", params.len())
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Filters, ordering and paging for [`crate::Table::find`].
///
/// Column names are snake_case and must be declared by the record type;
/// `Table` rejects unknown columns before building SQL.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    /// `(column, descending)` pairs. Empty means newest insert first.
    pub order: Vec<(String, bool)>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, f: Filter) -> Self {
        self.filters.push(f);
        self
    }

    pub fn eq(self, col: &str, v: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(col.to_string(), v.into()))
    }

    /// Add an equality filter only when a value is given.
    pub fn eq_opt<V: Into<Value>>(self, col: &str, v: Option<V>) -> Self {
        match v {
            Some(v) => self.eq(col, v),
            None => self,
        }
    }

    pub fn gte_opt<V: Into<Value>>(self, col: &str, v: Option<V>) -> Self {
        match v {
            Some(v) => self.filter(Filter::Gte(col.to_string(), v.into())),
            None => self,
        }
    }

    pub fn lte_opt<V: Into<Value>>(self, col: &str, v: Option<V>) -> Self {
        match v {
            Some(v) => self.filter(Filter::Lte(col.to_string(), v.into())),
            None => self,
        }
    }

    /// Case-insensitive substring search across several columns.
    pub fn search(self, cols: &[&str], term: Option<&str>) -> Self {
        match term {
            Some(t) => self.filter(Filter::Or(
                cols.iter()
                    .map(|c| Filter::Ilike(c.to_string(), t.to_string()))
                    .collect(),
            )),
            None => self,
        }
    }

    pub fn order_by(mut self, col: &str, desc: bool) -> Self {
        self.order.push((col.to_string(), desc));
        self
    }

    /// Apply limit, offset and sort from list parameters.
    ///
    /// `sort` is a camelCase field name, optionally prefixed with `-` for
    /// descending order.
    pub fn page(mut self, params: &ListParams) -> Self {
        self.limit = Some(params.capped_limit());
        self.offset = params.offset;
        if let Some(sort) = params.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let (field, desc) = match sort.strip_prefix('-') {
                Some(f) => (f, true),
                None => (sort, false),
            };
            self.order.insert(0, (to_snake_case(field), desc));
        }
        self
    }

    /// All column names referenced by filters and ordering.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for f in &self.filters {
            f.collect_columns(&mut out);
        }
        out.extend(self.order.iter().map(|(c, _)| c.as_str()));
        out
    }

    /// Render the WHERE clause (with leading space, or empty) and its params.
    pub fn where_sql(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        if self.filters.is_empty() {
            return (String::new(), params);
        }
        let parts: Vec<String> = self.filters.iter().map(|f| f.render(&mut params)).collect();
        (format!(" WHERE {}", parts.join(" AND ")), params)
    }

    /// Render the ORDER BY clause (with leading space).
    pub fn order_sql(&self) -> String {
        let mut parts: Vec<String> = self
            .order
            .iter()
            .map(|(c, desc)| format!("\"{c}\" {}", if *desc { "DESC" } else { "ASC" }))
            .collect();
        parts.push("rowid DESC".to_string());
        format!(" ORDER BY {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_clause_numbering() {
        let q = Query::new()
            .eq("allocated_lab", "lab1")
            .eq_opt("consumable", Some(true))
            .eq_opt::<String>("category", None)
            .gte_opt("rate", Some(10.0f64));
        let (sql, params) = q.where_sql();
        assert_eq!(
            sql,
            " WHERE \"allocated_lab\" = ?1 AND \"consumable\" = ?2 AND \"rate\" >= ?3"
        );
        assert_eq!(params.len(), 3);
        assert_eq!(params[1], Value::Integer(1));
    }

    #[test]
    fn search_escapes_wildcards() {
        let q = Query::new().search(&["name", "asset_code"], Some("50%_off"));
        let (sql, params) = q.where_sql();
        assert_eq!(
            sql,
            " WHERE (\"name\" LIKE ?1 ESCAPE '\\' OR \"asset_code\" LIKE ?2 ESCAPE '\\')"
        );
        assert_eq!(params[0], Value::Text("%50\\%\\_off%".into()));
    }

    #[test]
    fn empty_in_matches_nothing() {
        let q = Query::new().filter(Filter::In("status".into(), vec![]));
        assert_eq!(q.where_sql().0, " WHERE 0 = 1");
    }

    #[test]
    fn page_parses_sort() {
        let params = ListParams {
            limit: 9999,
            offset: 20,
            sort: Some("-purchaseDate".into()),
            q: None,
        };
        let q = Query::new().page(&params);
        assert_eq!(q.limit, Some(500));
        assert_eq!(q.offset, 20);
        assert_eq!(q.order, vec![("purchase_date".to_string(), true)]);
        assert_eq!(q.order_sql(), " ORDER BY \"purchase_date\" DESC, rowid DESC");
        assert_eq!(q.columns(), vec!["purchase_date"]);
    }
}
