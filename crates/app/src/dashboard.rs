//! Home-page figures.

use serde::{Deserialize, Serialize};

use facturly_backend::tables::Query;
use facturly_backend::{BackendClient, BackendError, Table};
use facturly_invoicing::InvoiceStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusCounts {
    pub draft: u64,
    pub sent: u64,
    pub paid: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub clients: u64,
    pub products: u64,
    pub invoices: StatusCounts,
    /// Sum of TTC over paid invoices.
    pub paid_revenue: f64,
    /// Sum of TTC over sent, not yet paid, invoices.
    pub outstanding: f64,
}

#[derive(Debug, Deserialize)]
struct InvoiceFigures {
    #[serde(default)]
    status: InvoiceStatus,
    total_ttc: f64,
}

const FIGURES: Query = Query {
    select: "status,total_ttc",
    order: None,
};

pub async fn summary(client: &BackendClient) -> Result<DashboardSummary, BackendError> {
    let (clients, products, invoices) = tokio::try_join!(
        client.count(Table::Clients),
        client.count(Table::Products),
        client.list::<InvoiceFigures>(Table::Factures, FIGURES),
    )?;

    let mut summary = tally(&invoices);
    summary.clients = clients;
    summary.products = products;
    Ok(summary)
}

fn tally(invoices: &[InvoiceFigures]) -> DashboardSummary {
    invoices.iter().fold(DashboardSummary::default(), |mut acc, invoice| {
        match invoice.status {
            InvoiceStatus::Draft => acc.invoices.draft += 1,
            InvoiceStatus::Sent => {
                acc.invoices.sent += 1;
                acc.outstanding += invoice.total_ttc;
            }
            InvoiceStatus::Paid => {
                acc.invoices.paid += 1;
                acc.paid_revenue += invoice.total_ttc;
            }
        }
        acc
    })
}
