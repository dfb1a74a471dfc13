use indexmap::IndexMap;
use std::collections::BTreeMap;

use crate::config::QueryConfig;
use crate::schema::ModelSchema;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterOrderInfo, ListQuery, Page, PageInfo, PageSize, Row, SortDirection};

/// Schema-validated list filter: where, order, then pagination
pub struct Filter {
    where_data: FilterWhere,
    order_data: FilterOrder,
    size: Option<usize>,
    page: usize,
}

impl Filter {
    pub fn new(schema: &ModelSchema) -> Result<Self, FilterError> {
        Ok(Self {
            where_data: FilterWhere::new(),
            order_data: FilterOrder::build(&[], schema)?,
            size: Some(crate::config::CONFIG.query.default_page_size.max(1)),
            page: 0,
        })
    }

    pub fn assign(&mut self, query: &ListQuery, schema: &ModelSchema) -> Result<&mut Self, FilterError> {
        self.where_clause(&query.filters, schema)?;
        self.order(&query.sorts, schema)?;
        self.limit(query.size, query.page)?;
        Ok(self)
    }

    pub fn where_clause(&mut self, filters: &BTreeMap<String, String>, schema: &ModelSchema) -> Result<&mut Self, FilterError> {
        self.where_data = FilterWhere::build(filters, schema)?;
        Ok(self)
    }

    pub fn order(&mut self, sorts: &[FilterOrderInfo], schema: &ModelSchema) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::build(sorts, schema)?;
        Ok(self)
    }

    pub fn limit(&mut self, size: Option<PageSize>, page: Option<usize>) -> Result<&mut Self, FilterError> {
        self.limit_with(size, page, &crate::config::CONFIG.query)
    }

    /// `limit` against explicit query settings; sizes are never below one
    pub fn limit_with(
        &mut self,
        size: Option<PageSize>,
        page: Option<usize>,
        cfg: &QueryConfig,
    ) -> Result<&mut Self, FilterError> {
        self.size = match size {
            Some(PageSize::All) => None,
            Some(PageSize::Limit(0)) => return Err(FilterError::InvalidSize("Size must be positive".to_string())),
            Some(PageSize::Limit(n)) => {
                let max = cfg.max_page_size.unwrap_or(usize::MAX).max(1);
                if n > max {
                    if cfg.debug_logging {
                        tracing::warn!("Page size {} exceeds max {}, capping to max", n, max);
                    }
                    Some(max)
                } else {
                    Some(n)
                }
            }
            None => Some(cfg.default_page_size.max(1)),
        };
        self.page = page.unwrap_or(0);
        Ok(self)
    }

    /// Filter, sort and paginate `rows`; `count` reports the unfiltered total
    pub fn apply(&self, rows: Vec<Row>) -> Page {
        let count = rows.len();
        let mut filtered: Vec<Row> = rows.into_iter().filter(|r| self.where_data.matches(r)).collect();
        let count_filtered = filtered.len();
        self.order_data.sort(&mut filtered);

        let (rows, total_pages) = match self.size {
            None => (filtered, usize::from(count_filtered > 0)),
            Some(size) => {
                let total_pages = count_filtered.div_ceil(size.max(1));
                let rows = filtered
                    .into_iter()
                    .skip(self.page.saturating_mul(size))
                    .take(size)
                    .collect();
                (rows, total_pages)
            }
        };

        Page {
            rows,
            count,
            count_filtered,
            page_info: PageInfo {
                page: self.page,
                size: self.size,
                total_pages,
            },
        }
    }
}

impl ListQuery {
    /// Build from flat query-string pairs such as `filters[slug]=x`,
    /// `sorts[name]=desc`, `size=25`, `page=1`. Sorts apply in the order
    /// given; repeating a column keeps its first position.
    pub fn from_params(params: &[(String, String)]) -> Result<Self, FilterError> {
        let mut query = ListQuery::default();
        let mut sorts: IndexMap<String, SortDirection> = IndexMap::new();

        for (key, value) in params {
            if let Some(column) = bracketed(key, "filters") {
                query.filters.insert(column.to_string(), value.clone());
            } else if let Some(column) = bracketed(key, "sorts") {
                sorts.insert(column.to_string(), SortDirection::parse(value));
            } else if key == "sort" {
                for info in FilterOrder::parse_order_string(value) {
                    sorts.insert(info.column, info.sort);
                }
            } else if key == "size" {
                query.size = Some(parse_size(value)?);
            } else if key == "page" {
                query.page = Some(
                    value
                        .parse()
                        .map_err(|_| FilterError::InvalidPage(value.clone()))?,
                );
            }
        }

        query.sorts = sorts
            .into_iter()
            .map(|(column, sort)| FilterOrderInfo { column, sort })
            .collect();
        Ok(query)
    }
}

fn bracketed<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?
        .strip_prefix('[')?
        .strip_suffix(']')
        .filter(|c| !c.is_empty())
}

fn parse_size(raw: &str) -> Result<PageSize, FilterError> {
    if raw.eq_ignore_ascii_case("all") {
        return Ok(PageSize::All);
    }
    raw.parse::<usize>()
        .map(PageSize::Limit)
        .map_err(|_| FilterError::InvalidSize(raw.to_string()))
}
