//! Customer export.

use tracing::instrument;

use odooflow_core::{CustomerId, EntityKind, LocalCustomer, RemoteId, RemoteRef};

use super::{SyncSession, settle};
use crate::error::SyncError;
use crate::mapper::customers;
use crate::report::{OutcomeStatus, SyncOutcome};
use crate::rpc::{Domain, RpcTransport};
use crate::store::EntityStore;

impl<T: RpcTransport, S: EntityStore> SyncSession<'_, T, S> {
    /// Export one customer as a `res.partner`, matched by email.
    ///
    /// # Errors
    ///
    /// Returns batch-fatal errors only.
    #[instrument(skip(self))]
    pub async fn sync_customer(&mut self, id: CustomerId) -> Result<SyncOutcome, SyncError> {
        let customer = match self.store.customer(id).await {
            Ok(customer) => customer,
            Err(e) => return settle(format!("Customer #{id}"), Err(e.into())),
        };
        let name = if customer.contact.name.trim().is_empty() {
            format!("Customer #{id}")
        } else {
            customer.contact.name.clone()
        };
        let result = self.export_customer(&customer).await;
        settle(name, result)
    }

    pub(super) async fn export_customer(
        &mut self,
        customer: &LocalCustomer,
    ) -> Result<(OutcomeStatus, RemoteId), SyncError> {
        let options = self.options;
        let payload = customers::to_remote(
            &customer.contact,
            &options.customer_fields,
            &mut self.cache,
            &self.rpc,
        )
        .await?;

        let existing = match self
            .store
            .remote_id(EntityKind::Customer, customer.id.as_i64())
            .await?
        {
            Some(remote_id) => Some(remote_id),
            None => {
                let email = customers::contact_email(&customer.contact)?;
                self.rpc
                    .search_one(
                        customers::MODEL,
                        Domain::new().equals("email", email.as_str()),
                    )
                    .await?
            }
        };

        let (status, remote_id) = match existing {
            Some(remote_id) => {
                self.rpc.write(customers::MODEL, remote_id, payload).await?;
                (OutcomeStatus::Updated, remote_id)
            }
            None => (
                OutcomeStatus::Created,
                self.rpc.create(customers::MODEL, payload).await?,
            ),
        };

        self.remember(RemoteRef::new(
            EntityKind::Customer,
            customer.id.as_i64(),
            remote_id,
        ))
        .await;
        Ok((status, remote_id))
    }
}
