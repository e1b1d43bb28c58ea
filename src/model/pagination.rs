use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::Serialize;

/// Pagination parameters, taken from the `page_num` and `page_size` query
/// parameters with sensible defaults.
pub struct Pagination {
    page_num: usize,
    page_size: usize,
}

impl Pagination {
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of records to skip before this page starts. Saturates rather
    /// than overflowing on absurd-but-well-formed page numbers.
    pub fn skip(&self) -> u64 {
        (self.page_num - 1).saturating_mul(self.page_size) as u64
    }

    /// Describe this page of a result set with the given total size.
    pub fn result(self, total: usize) -> PaginationResult {
        PaginationResult {
            page_num: self.page_num,
            page_size: self.page_size,
            total,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let page_num = match req.query_value::<usize>("page_num").unwrap_or(Ok(1)) {
            Ok(page_num) if page_num > 0 => page_num,
            _ => return request::Outcome::Failure((Status::BadRequest, ())),
        };
        let page_size = match req.query_value::<usize>("page_size").unwrap_or(Ok(50)) {
            Ok(page_size) if page_size > 0 => page_size,
            _ => return request::Outcome::Failure((Status::BadRequest, ())),
        };
        request::Outcome::Success(Self {
            page_num,
            page_size,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationResult {
    page_num: usize,
    page_size: usize,
    total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_is_page_offset() {
        let pagination = Pagination {
            page_num: 3,
            page_size: 50,
        };
        assert_eq!(pagination.skip(), 100);
    }

    #[test]
    fn skip_saturates_on_huge_page_numbers() {
        let pagination = Pagination {
            page_num: usize::MAX,
            page_size: 2,
        };
        assert_eq!(pagination.skip(), usize::MAX as u64);
    }
}
