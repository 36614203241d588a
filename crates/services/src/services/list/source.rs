use async_trait::async_trait;

use super::{
    error::SourceError,
    types::{Cursor, Mutation, Page, Row},
};

pub type RowId<S> = <<S as RowSource>::Row as Row>::Id;

/// A mutation addressed to the rows of `S`
pub type SourceMutation<S> =
    Mutation<RowId<S>, <S as RowSource>::CreatePayload, <S as RowSource>::UpdatePayload>;

/// Data collaborator behind a list: pages rows in and carries mutations out.
///
/// Implementations report failures with their cause and never retry; retry
/// policy belongs to whoever drives the list.
#[async_trait]
pub trait RowSource: Send + Sync + 'static {
    type Row: Row;
    type Filter: Clone + std::fmt::Debug + Default + PartialEq + Send + Sync + 'static;
    type CreatePayload: Clone + std::fmt::Debug + Send + Sync + 'static;
    type UpdatePayload: Clone + std::fmt::Debug + Send + Sync + 'static;

    /// Fetch the page starting at `cursor` (`None` = first page), in server order.
    async fn fetch_page(
        &self,
        filter: &Self::Filter,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page<Self::Row>, SourceError>;

    async fn create_row(&self, payload: &Self::CreatePayload) -> Result<Self::Row, SourceError>;

    async fn update_row(
        &self,
        id: &<Self::Row as Row>::Id,
        payload: &Self::UpdatePayload,
    ) -> Result<Self::Row, SourceError>;

    /// Deleting a row that is already gone must succeed.
    async fn delete_row(&self, id: &<Self::Row as Row>::Id) -> Result<(), SourceError>;

    /// Local stand-in shown until the server answers; carries a placeholder id.
    fn project_create(&self, payload: &Self::CreatePayload) -> Self::Row;

    /// `current` with `payload` applied, as the server is expected to return it.
    fn project_update(&self, current: &Self::Row, payload: &Self::UpdatePayload) -> Self::Row;
}
