//! Remote business entities to local companies.

use super::Reconciler;
use crate::error::SyncResult;
use crate::models::remote::RemoteBusinessEntity;
use crate::models::{Company, Currency, NewCompany};
use tracing::{info, instrument};

const DEFAULT_CURRENCY: &str = "USD";

impl Reconciler {
    /// Company owning a remote document. Documents without a business entity
    /// belong to the default company.
    #[instrument(skip(self))]
    pub async fn resolve_company(&self, business_entity_id: Option<&str>) -> SyncResult<Company> {
        let Some(entity_id) = business_entity_id.filter(|id| !id.is_empty()) else {
            return self.default_company().await;
        };

        if let Some(company) = self.store().find_company_by_remote_id(entity_id).await? {
            return Ok(company);
        }

        let entity = self.api().retrieve_business_entity(entity_id).await?;
        let (company, _) = self.get_or_create_company(&entity).await?;
        Ok(company)
    }

    /// Returns the company and whether it was created.
    pub async fn get_or_create_company(
        &self,
        entity: &RemoteBusinessEntity,
    ) -> SyncResult<(Company, bool)> {
        if let Some(company) = self.store().find_company_by_remote_id(&entity.id).await? {
            return Ok((company, false));
        }

        let currency_code = entity
            .currency_code
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        self.ensure_currency(&currency_code).await?;

        let company = self
            .store()
            .create_company(NewCompany {
                remote_id: Some(entity.id.clone()),
                name: entity.name.clone().unwrap_or_else(|| entity.id.clone()),
                currency_code,
            })
            .await?;
        info!(company_id = %company.company_id, entity_id = %entity.id, "Company created from business entity");
        Ok((company, true))
    }

    /// Creates the currency when missing; returns whether it was created.
    pub async fn ensure_currency(&self, code: &str) -> SyncResult<bool> {
        if self.store().find_currency(code).await?.is_some() {
            return Ok(false);
        }
        self.store().create_currency(Currency::from_code(code)).await?;
        info!(currency = %code, "Currency created");
        Ok(true)
    }

    async fn default_company(&self) -> SyncResult<Company> {
        let name = &self.settings().default_company_name;
        if let Some(company) = self.store().find_company_by_name(name).await? {
            return Ok(company);
        }
        self.ensure_currency(DEFAULT_CURRENCY).await?;
        self.store()
            .create_company(NewCompany {
                remote_id: None,
                name: name.clone(),
                currency_code: DEFAULT_CURRENCY.to_string(),
            })
            .await
    }
}
