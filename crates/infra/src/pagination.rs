//! Page requests and paginated results for order listings.

use serde::{Deserialize, Serialize};

use salesdesk_core::DomainError;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 1000;

/// Sortable order columns (wire names are the camelCase view fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    OrderDate,
    CancellationDate,
    CustomerName,
    Total,
    Id,
}

impl SortField {
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "orderDate" => Ok(SortField::OrderDate),
            "cancellationDate" => Ok(SortField::CancellationDate),
            "customerName" => Ok(SortField::CustomerName),
            "total" => Ok(SortField::Total),
            "id" => Ok(SortField::Id),
            other => Err(DomainError::validation(format!(
                "unknown sort field '{other}' (expected one of orderDate, cancellationDate, customerName, total, id)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: SortField,
    pub direction: Direction,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: SortField::OrderDate,
            direction: Direction::Asc,
        }
    }
}

impl Sort {
    /// Parse `field` or `field,asc|desc` (direction is case-insensitive, default asc).
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let mut parts = s.split(',').map(str::trim);
        let field = SortField::parse(parts.next().unwrap_or_default())?;
        let direction = match parts.next() {
            None => Direction::Asc,
            Some(d) if d.eq_ignore_ascii_case("asc") => Direction::Asc,
            Some(d) if d.eq_ignore_ascii_case("desc") => Direction::Desc,
            Some(d) => {
                return Err(DomainError::validation(format!(
                    "unknown sort direction '{d}' (expected asc or desc)"
                )));
            }
        };
        if parts.next().is_some() {
            return Err(DomainError::validation(format!("malformed sort '{s}'")));
        }
        Ok(Self { field, direction })
    }
}

/// Zero-based page request. Ties in the sort column are broken by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
    pub sort: Sort,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            sort: Sort::default(),
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<u32>, size: Option<u32>, sort: Option<Sort>) -> Result<Self, DomainError> {
        let size = size.unwrap_or(DEFAULT_PAGE_SIZE);
        if size == 0 {
            return Err(DomainError::validation("page size must be positive"));
        }
        Ok(Self {
            page: page.unwrap_or(0),
            size: size.min(MAX_PAGE_SIZE), // Cap for safety
            sort: sort.unwrap_or_default(),
        })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }
}

/// One page of results plus what a client needs to page through the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u64,
    pub page: u32,
    pub size: u32,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_elements: u64, request: &PageRequest) -> Self {
        Self {
            content,
            total_elements,
            total_pages: total_elements.div_ceil(u64::from(request.size)),
            page: request.page,
            size: request.size,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            page: self.page,
            size: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sort_parses_field_and_optional_direction() {
        assert_eq!(
            Sort::parse("total,DESC").unwrap(),
            Sort {
                field: SortField::Total,
                direction: Direction::Desc
            }
        );
        assert_eq!(Sort::parse("customerName").unwrap().direction, Direction::Asc);
    }

    #[test]
    fn sort_rejects_unknown_fields_and_directions() {
        assert!(matches!(Sort::parse("price"), Err(DomainError::Validation(_))));
        assert!(matches!(Sort::parse("total,up"), Err(DomainError::Validation(_))));
        assert!(matches!(Sort::parse("total,asc,id"), Err(DomainError::Validation(_))));
    }

    #[test]
    fn page_request_defaults_and_caps() {
        let req = PageRequest::new(None, None, None).unwrap();
        assert_eq!(req, PageRequest::default());

        let req = PageRequest::new(Some(3), Some(50_000), None).unwrap();
        assert_eq!(req.size, MAX_PAGE_SIZE);
        assert_eq!(req.offset(), 3 * u64::from(MAX_PAGE_SIZE));

        assert!(PageRequest::new(None, Some(0), None).is_err());
    }

    #[test]
    fn total_pages_rounds_up() {
        let req = PageRequest::new(Some(0), Some(10), None).unwrap();
        assert_eq!(Page::new(vec![1; 10], 21, &req).total_pages, 3);
        assert_eq!(Page::<u8>::new(vec![], 0, &req).total_pages, 0);
    }

    #[test]
    fn page_serializes_with_camel_case_keys() {
        let req = PageRequest::new(Some(1), Some(2), None).unwrap();
        let json = serde_json::to_value(Page::new(vec!["a"], 3, &req).map(str::to_uppercase)).unwrap();
        assert_eq!(json["content"][0], "A");
        assert_eq!(json["totalElements"], 3);
        assert_eq!(json["totalPages"], 2);
        assert_eq!(json["page"], 1);
        assert_eq!(json["size"], 2);
    }

    proptest! {
        #[test]
        fn pages_cover_every_element_exactly(total in 0u64..100_000, size in 1u32..1_000) {
            let req = PageRequest::new(None, Some(size), None).unwrap();
            let pages = Page::<u8>::new(vec![], total, &req).total_pages;
            prop_assert!(pages * u64::from(size) >= total);
            prop_assert!(pages == 0 || (pages - 1) * u64::from(size) < total);
        }
    }
}
