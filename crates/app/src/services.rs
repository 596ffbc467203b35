//! Data services: one repository per resource over the shared client.
//!
//! Writes validate the raw form input first; an invalid submission never
//! reaches the network.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use facturly_backend::tables::Query;
use facturly_backend::{ClientAccessor, Table};
use facturly_clients::{ClientInput, ClientRecord, NewClient};
use facturly_core::{ClientId, InvoiceId, ProductId, Validate};
use facturly_invoicing::{InvoiceInput, InvoiceRecord, NewInvoice};
use facturly_products::{NewProduct, ProductInput, ProductRecord};

use crate::error::ServiceError;

/// Binds a table to its row, form and id types.
pub trait Resource {
    const TABLE: Table;
    /// Column selection for reads.
    const SELECT: &'static str = "*";

    type Id: AsRef<str>;
    type Input: Validate<Output = Self::Payload>;
    type Payload: Serialize;
    type Record: DeserializeOwned;
}

#[derive(Debug, Clone, Copy)]
pub struct Clients;

impl Resource for Clients {
    const TABLE: Table = Table::Clients;
    type Id = ClientId;
    type Input = ClientInput;
    type Payload = NewClient;
    type Record = ClientRecord;
}

#[derive(Debug, Clone, Copy)]
pub struct Invoices;

impl Resource for Invoices {
    const TABLE: Table = Table::Factures;
    // Listings show the client's name next to each invoice.
    const SELECT: &'static str = "*, clients(name)";
    type Id = InvoiceId;
    type Input = InvoiceInput;
    type Payload = NewInvoice;
    type Record = InvoiceRecord;
}

#[derive(Debug, Clone, Copy)]
pub struct Products;

impl Resource for Products {
    const TABLE: Table = Table::Products;
    type Id = ProductId;
    type Input = ProductInput;
    type Payload = NewProduct;
    type Record = ProductRecord;
}

pub type ClientService = Repository<Clients>;
pub type InvoiceService = Repository<Invoices>;
pub type ProductService = Repository<Products>;

/// CRUD over one table. Rows the signed-in user may not see are simply
/// absent (the backend filters them).
pub struct Repository<R> {
    accessor: Arc<ClientAccessor>,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for Repository<R> {
    fn clone(&self) -> Self {
        Self {
            accessor: Arc::clone(&self.accessor),
            _resource: PhantomData,
        }
    }
}

impl<R> core::fmt::Debug for Repository<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Repository")
            .field("resource", &core::any::type_name::<R>())
            .finish()
    }
}

impl<R: Resource> Repository<R> {
    pub fn new(accessor: Arc<ClientAccessor>) -> Self {
        Self {
            accessor,
            _resource: PhantomData,
        }
    }

    fn query() -> Query {
        Query::select(R::SELECT)
    }

    /// All visible rows, newest first.
    pub async fn list(&self) -> Result<Vec<R::Record>, ServiceError> {
        let client = self.accessor.get();
        Ok(client.list(R::TABLE, Self::query()).await?)
    }

    pub async fn get(&self, id: &R::Id) -> Result<Option<R::Record>, ServiceError> {
        let client = self.accessor.get();
        Ok(client.get(R::TABLE, Self::query(), id.as_ref()).await?)
    }

    pub async fn create(&self, input: &R::Input) -> Result<R::Record, ServiceError> {
        let payload = input.validate().inspect_err(|errors| {
            tracing::debug!(table = %R::TABLE, %errors, "create rejected");
        })?;
        let client = self.accessor.get();
        Ok(client.insert(R::TABLE, &payload).await?)
    }

    /// `Ok(None)` when the row does not exist (or is not visible).
    pub async fn update(&self, id: &R::Id, input: &R::Input) -> Result<Option<R::Record>, ServiceError> {
        let payload = input.validate().inspect_err(|errors| {
            tracing::debug!(table = %R::TABLE, %errors, "update rejected");
        })?;
        let client = self.accessor.get();
        Ok(client.update(R::TABLE, id.as_ref(), &payload).await?)
    }

    pub async fn delete(&self, id: &R::Id) -> Result<(), ServiceError> {
        let client = self.accessor.get();
        Ok(client.delete(R::TABLE, id.as_ref()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facturly_backend::{BackendClient, BackendError};

    fn offline() -> ClientService {
        Repository::new(Arc::new(ClientAccessor::from_client(Arc::new(
            BackendClient::unconfigured(),
        ))))
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_the_client_is_used() {
        let service = offline();
        let err = service.create(&ClientInput::default()).await.unwrap_err();
        let errors = err.field_errors().unwrap();
        assert_eq!(errors.get("name"), Some("Name is required"));
    }

    #[tokio::test]
    async fn valid_input_reaches_the_client() {
        let service = offline();
        let input = ClientInput {
            name: Some("Acme".into()),
            ..ClientInput::default()
        };
        let err = service.create(&input).await.unwrap_err();
        assert_eq!(err, ServiceError::Backend(BackendError::NotConfigured));
    }

    #[test]
    fn invoices_select_the_client_name() {
        assert_eq!(Repository::<Invoices>::query().select, "*, clients(name)");
        assert_eq!(Repository::<Products>::query().select, "*");
        assert_eq!(Invoices::TABLE.name(), "factures");
    }
}
