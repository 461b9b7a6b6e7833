//! Paginated table reads

use crate::engine::resolve_column;
use crate::manager::ActiveConnection;
use crate::schema::{ColumnFilter, SortSpec, TableDataRequest, TableDataResponse};
use crate::value::RowValue;
use crate::{Error, Result};

/// Read a COUNT(*) cell, whichever integer shape the backend used
fn count_value(value: Option<&RowValue>) -> Option<u64> {
    match value? {
        RowValue::Integer(count) => u64::try_from(*count).ok(),
        RowValue::Text(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Whether rows exist past this page
///
/// Without a total this is a guess: a full page is assumed to have a successor.
fn has_more(offset: u64, returned: u64, limit: u64, total: Option<u64>) -> bool {
    match total {
        Some(total) => offset.saturating_add(returned) < total,
        None => returned == limit,
    }
}

impl ActiveConnection {
    /// Fetch one page of rows plus an advisory total
    ///
    /// The total comes from a separate COUNT and may disagree with the page
    /// under concurrent writes. A failing COUNT leaves `total` empty rather
    /// than failing the page.
    pub async fn get_table_data(&self, request: &TableDataRequest) -> Result<TableDataResponse> {
        if request.limit == 0 {
            return Err(Error::InvalidRequest("limit must be positive".to_string()));
        }
        let limit = request.limit.min(self.settings().max_page_size);
        let database = request.database.as_str();
        let table = request.table.as_str();

        let columns = self.require_columns(database, table).await?;
        let filters = request
            .filters
            .iter()
            .map(|filter| {
                Ok(ColumnFilter {
                    column: resolve_column(self.dialect(), table, &columns, &filter.column)?,
                    ..filter.clone()
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let sort = match &request.sort {
            Some(sort) => Some(SortSpec {
                column: resolve_column(self.dialect(), table, &columns, &sort.column)?,
                order: sort.order,
            }),
            None => None,
        };

        let target = format!("{database}.{table}");
        let select = self.dialect().build_select(
            database,
            table,
            &columns,
            &filters,
            sort.as_ref(),
            request.offset,
            limit,
        )?;
        let page = self.fetch(&select, "select", &target).await?;

        let count = self.dialect().build_count(database, table, &columns, &filters)?;
        let total = match self.fetch(&count, "count", &target).await {
            Ok(counted) => count_value(counted.rows.first().and_then(|row| row.first())),
            Err(error) => {
                tracing::warn!(table = %target, error = %error, "row count failed");
                None
            }
        };

        // Empty pages carry no result metadata on some backends
        let column_names = if page.columns.is_empty() {
            columns.into_iter().map(|column| column.name).collect()
        } else {
            page.columns
        };

        let returned = page.rows.len() as u64;
        Ok(TableDataResponse {
            columns: column_names,
            rows: page.rows,
            total,
            offset: request.offset,
            limit,
            has_more: has_more(request.offset, returned, limit, total),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerSettings;
    use crate::schema::{ColumnFilter, FilterOperator, SortOrder};
    use crate::test_support;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_has_more() {
        assert!(has_more(0, 10, 10, Some(25)));
        assert!(!has_more(20, 5, 10, Some(25)));
        assert!(has_more(0, 10, 10, None));
        assert!(!has_more(0, 3, 10, None));
    }

    #[test]
    fn test_count_value_shapes() {
        assert_eq!(count_value(Some(&RowValue::Integer(7))), Some(7));
        assert_eq!(count_value(Some(&RowValue::Text("12".into()))), Some(12));
        assert_eq!(count_value(Some(&RowValue::Integer(-1))), None);
        assert_eq!(count_value(None), None);
    }

    #[tokio::test]
    async fn test_last_page_is_partial() {
        let (manager, _directory) = test_support::seeded_manager(25).await;

        let page = manager
            .get_table_data(
                &TableDataRequest::new("main", "users")
                    .with_limit(10)
                    .with_offset(20)
                    .with_sort("id", SortOrder::Ascending),
            )
            .await
            .unwrap();

        assert_eq!(page.rows.len(), 5);
        assert_eq!(page.total, Some(25));
        assert!(!page.has_more);
        assert_eq!(page.rows[0][0], RowValue::Integer(21));

        let first = manager
            .get_table_data(&TableDataRequest::page("main", "users", 1, 10))
            .await
            .unwrap();
        assert_eq!(first.rows.len(), 10);
        assert!(first.has_more);
    }

    #[tokio::test]
    async fn test_filters_and_sort() {
        let (manager, _directory) = test_support::seeded_manager(25).await;

        let page = manager
            .get_table_data(
                &TableDataRequest::new("main", "users")
                    .with_filter(ColumnFilter::new("age", FilterOperator::Gte, 30))
                    .with_filter(ColumnFilter::new("email", FilterOperator::Like, "user1%"))
                    .with_sort("id", SortOrder::Descending)
                    .with_limit(3),
            )
            .await
            .unwrap();

        let ids: Vec<RowValue> = page.rows.iter().map(|row| row[0].clone()).collect();
        assert_eq!(ids, vec![RowValue::Integer(19), RowValue::Integer(18), RowValue::Integer(17)]);
        assert_eq!(page.total, Some(10));
        assert!(page.has_more);

        let nulls = manager
            .get_table_data(
                &TableDataRequest::new("main", "users").with_filter(ColumnFilter::new(
                    "age",
                    FilterOperator::IsNull,
                    RowValue::Null,
                )),
            )
            .await
            .unwrap();
        assert_eq!(nulls.total, Some(0));
        assert!(nulls.rows.is_empty());
        assert_eq!(nulls.columns, vec!["id", "name", "email", "age"]);
    }

    #[tokio::test]
    async fn test_request_validation() {
        let (manager, _directory) = test_support::seeded_manager(1).await;

        assert!(matches!(
            manager
                .get_table_data(&TableDataRequest::new("main", "users").with_limit(0))
                .await,
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            manager
                .get_table_data(&TableDataRequest::new("main", "users").with_sort("rank", SortOrder::Ascending))
                .await,
            Err(Error::InvalidColumn { .. })
        ));
        assert!(matches!(
            manager
                .get_table_data(
                    &TableDataRequest::new("main", "users").with_filter(ColumnFilter::equals("rank", 1))
                )
                .await,
            Err(Error::InvalidColumn { .. })
        ));
    }

    #[tokio::test]
    async fn test_limit_is_clamped() {
        let settings = ManagerSettings {
            max_page_size: 4,
            ..ManagerSettings::default()
        };
        let (manager, _directory) = test_support::sqlite_manager_with(settings).await;
        test_support::seed_users(&manager, 10).await;

        let page = manager
            .get_table_data(&TableDataRequest::new("main", "users").with_limit(1000))
            .await
            .unwrap();
        assert_eq!(page.limit, 4);
        assert_eq!(page.rows.len(), 4);
        assert!(page.has_more);
    }
}
