use std::collections::HashMap;

use tracing::debug;

use super::{field_path, Query};

/// How a group of clauses is combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

impl BoolOperator {
    pub fn combine(self, clauses: Vec<Query>) -> Query {
        match self {
            BoolOperator::And => Query::And(clauses),
            BoolOperator::Or => Query::Or(clauses),
        }
    }

    /// `"and"` / `"or"`, case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "and" => Some(BoolOperator::And),
            "or" => Some(BoolOperator::Or),
            _ => None,
        }
    }
}

/// Price category of an event as stored in `price_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceType {
    Free,
    Paid,
}

impl PriceType {
    pub fn as_str(self) -> &'static str {
        match self {
            PriceType::Free => "gratuit",
            PriceType::Paid => "payant",
        }
    }

    /// Request encoding: `"1"` selects free events, any other value paid ones.
    pub fn from_param(value: &str) -> Self {
        if value == "1" {
            PriceType::Free
        } else {
            PriceType::Paid
        }
    }
}

impl From<bool> for PriceType {
    /// `true` means paid.
    fn from(paid: bool) -> Self {
        if paid {
            PriceType::Paid
        } else {
            PriceType::Free
        }
    }
}

/// Optional search criteria over events.
///
/// Every criterion that is set becomes one clause of the compiled query;
/// the clauses are joined with the global operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    global_operator: BoolOperator,
    text_filter: Option<String>,
    price_type: Option<PriceType>,
    category: Option<String>,
    tags: Option<Vec<String>>,
    tags_operator: BoolOperator,
    pmr: bool,
    deaf: bool,
    blind: bool,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            global_operator: BoolOperator::And,
            text_filter: None,
            price_type: None,
            category: None,
            tags: None,
            tags_operator: BoolOperator::Or,
            pmr: false,
            deaf: false,
            blind: false,
        }
    }
}

impl Filter {
    pub fn builder() -> FilterBuilder {
        FilterBuilder::default()
    }

    /// Build a filter from request parameters.
    ///
    /// Recognized keys: `search`, `category`, `price_type`, `tags`
    /// (comma-separated), `tags_operator`, `operator`, and the presence-only
    /// flags `pmr`, `deaf` and `blind`. Blank text values count as absent.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let text = |key: &str| {
            params
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let mut builder = Filter::builder();
        if let Some(search) = text("search") {
            builder = builder.text(search);
        }
        if let Some(category) = text("category") {
            builder = builder.category(category);
        }
        if let Some(price_type) = params.get("price_type") {
            builder = builder.price_type(PriceType::from_param(price_type));
        }
        if let Some(tags) = text("tags") {
            builder = builder.tags(
                tags.split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string),
            );
        }
        if let Some(op) = params.get("tags_operator").and_then(|v| BoolOperator::parse(v)) {
            builder = builder.tags_operator(op);
        }
        if let Some(op) = params.get("operator").and_then(|v| BoolOperator::parse(v)) {
            builder = builder.global_operator(op);
        }
        builder
            .pmr(params.contains_key("pmr"))
            .deaf(params.contains_key("deaf"))
            .blind(params.contains_key("blind"))
            .build()
    }

    pub fn global_operator(&self) -> BoolOperator {
        self.global_operator
    }

    pub fn text_filter(&self) -> Option<&str> {
        self.text_filter.as_deref()
    }

    pub fn price_type(&self) -> Option<PriceType> {
        self.price_type
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn tags(&self) -> Option<&[String]> {
        self.tags.as_deref()
    }

    pub fn tags_operator(&self) -> BoolOperator {
        self.tags_operator
    }

    pub fn is_empty(&self) -> bool {
        self.text_filter.is_none()
            && self.price_type.is_none()
            && self.category.is_none()
            && self.tags.is_none()
            && !self.pmr
            && !self.deaf
            && !self.blind
    }

    /// Compile the criteria into a query.
    ///
    /// Clauses come in a fixed order: text, price type, category, tags, pmr,
    /// deaf, blind. No criteria gives [`Query::MatchAll`], a single one is
    /// returned bare.
    pub fn compile(&self) -> Query {
        let mut clauses = Vec::new();

        if let Some(text) = &self.text_filter {
            let pattern = regex::escape(text);
            clauses.push(Query::Or(vec![
                Query::regex(field_path("title"), pattern.clone()),
                Query::regex(field_path("description"), pattern),
            ]));
        }
        if let Some(price_type) = self.price_type {
            clauses.push(Query::equals(field_path("price_type"), price_type.as_str()));
        }
        if let Some(category) = &self.category {
            clauses.push(Query::equals(field_path("category"), category.as_str()));
        }
        if let Some(tags) = &self.tags {
            clauses.push(self.tags_clause(tags));
        }
        for (flag, set) in [("pmr", self.pmr), ("deaf", self.deaf), ("blind", self.blind)] {
            if set {
                clauses.push(Query::equals(field_path(flag), 1));
            }
        }

        let query = match clauses.len() {
            0 => Query::MatchAll,
            1 => clauses.remove(0),
            _ => self.global_operator.combine(clauses),
        };
        debug!("Compiled filter: {}", query);
        query
    }

    /// An empty tag list gives an empty `And`, which matches everything.
    fn tags_clause(&self, tags: &[String]) -> Query {
        let mut clauses: Vec<Query> = tags
            .iter()
            .map(|tag| Query::regex(field_path("tags"), regex::escape(tag)))
            .collect();
        match clauses.len() {
            0 => Query::And(clauses),
            1 => clauses.remove(0),
            _ => self.tags_operator.combine(clauses),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    filter: Filter,
}

impl FilterBuilder {
    pub fn global_operator(mut self, op: BoolOperator) -> Self {
        self.filter.global_operator = op;
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.filter.text_filter = Some(text.into());
        self
    }

    pub fn price_type(mut self, price_type: impl Into<PriceType>) -> Self {
        self.filter.price_type = Some(price_type.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.filter.category = Some(category.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn tags_operator(mut self, op: BoolOperator) -> Self {
        self.filter.tags_operator = op;
        self
    }

    pub fn pmr(mut self, pmr: bool) -> Self {
        self.filter.pmr = pmr;
        self
    }

    pub fn deaf(mut self, deaf: bool) -> Self {
        self.filter.deaf = deaf;
        self
    }

    pub fn blind(mut self, blind: bool) -> Self {
        self.filter.blind = blind;
        self
    }

    pub fn build(self) -> Filter {
        self.filter
    }
}
