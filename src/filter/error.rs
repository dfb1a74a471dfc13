use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Invalid column name: {0}")]
    InvalidColumn(String),

    #[error("Column is not filterable: {0}")]
    NotFilterable(String),

    #[error("Column is not sortable: {0}")]
    NotSortable(String),

    #[error("Invalid page size: {0}")]
    InvalidSize(String),

    #[error("Invalid page: {0}")]
    InvalidPage(String),
}
