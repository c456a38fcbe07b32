use serde::Serialize;
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Whitelisted columns
//
// Request text never reaches the SQL string: every token is resolved to one
// of these enums first, and only the `&'static str` they map to is formatted
// into the query. Unknown tokens fall back to the default instead of erroring.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Id,
    Temperature,
    Humidity,
    Light,
    Timestamp,
}

impl SortField {
    pub const ALL: [SortField; 5] = [
        SortField::Id,
        SortField::Temperature,
        SortField::Humidity,
        SortField::Light,
        SortField::Timestamp,
    ];

    /// Exact, case-sensitive match against the API field names.
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "id" => Some(Self::Id),
            "temperature" => Some(Self::Temperature),
            "humidity" => Some(Self::Humidity),
            "light" => Some(Self::Light),
            "timestamp" => Some(Self::Timestamp),
            _ => None,
        }
    }

    /// Column reference in `sensor_data`.
    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Light => "light",
            Self::Timestamp => "recorded_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Case-insensitive: `ASC`, `asc` and `Asc` are all accepted.
    pub fn from_param(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("asc") {
            Some(Self::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchField {
    #[default]
    All,
    Column(SortField),
}

impl SearchField {
    pub fn from_param(s: &str) -> Option<Self> {
        if s == "all" {
            Some(Self::All)
        } else {
            SortField::from_param(s).map(Self::Column)
        }
    }
}

// ---------------------------------------------------------------------------
// HistoryQuery
// ---------------------------------------------------------------------------

/// Fully resolved parameters for a reading-history query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub sort_field: SortField,
    pub order: SortOrder,
    pub search_field: SearchField,
    /// Substring to search for; empty means no filtering.
    pub search: String,
}

impl HistoryQuery {
    /// Resolve raw request parameters, substituting defaults for anything
    /// missing or outside the whitelist.
    pub fn resolve(
        sort_field: Option<&str>,
        order: Option<&str>,
        search_field: Option<&str>,
        search: Option<&str>,
    ) -> Self {
        Self {
            sort_field: sort_field.and_then(SortField::from_param).unwrap_or_default(),
            order: order.and_then(SortOrder::from_param).unwrap_or_default(),
            search_field: search_field
                .and_then(SearchField::from_param)
                .unwrap_or_default(),
            search: search.unwrap_or_default().to_owned(),
        }
    }

    pub fn has_search(&self) -> bool {
        !self.search.is_empty()
    }

    /// SQL text for this query. When `has_search()` is true the statement
    /// expects the value of `like_pattern()` bound as `$1`.
    pub fn to_sql(&self) -> String {
        let mut sql =
            String::from("SELECT id, temperature, humidity, light, recorded_at FROM sensor_data");

        if self.has_search() {
            let columns: Vec<SortField> = match self.search_field {
                SearchField::All => SortField::ALL.to_vec(),
                SearchField::Column(c) => vec![c],
            };
            let predicates: Vec<String> = columns
                .iter()
                .map(|c| format!("CAST({} AS TEXT) ILIKE $1", c.column()))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" OR "));
        }

        let dir = self.order.keyword();
        sql.push_str(&format!(" ORDER BY {} {dir}", self.sort_field.column()));
        if self.sort_field != SortField::Id {
            sql.push_str(&format!(", id {dir}"));
        }
        sql
    }

    /// `%term%` with LIKE metacharacters escaped so the term matches literally.
    pub fn like_pattern(&self) -> String {
        let mut pattern = String::with_capacity(self.search.len() + 2);
        pattern.push('%');
        for ch in self.search.chars() {
            if matches!(ch, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(ch);
        }
        pattern.push('%');
        pattern
    }
}
