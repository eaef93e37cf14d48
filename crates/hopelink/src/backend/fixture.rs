//! Deterministic in-memory backend for tests and the local CLI.
//!
//! Serves a fixed beneficiary pool, records every write it receives, and
//! counts read calls so tests can assert that safety rejections happen
//! before any backend traffic.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use hopelink_protocol::{Beneficiary, Orphanage, SupplyNeed};

use super::{
    AuditEntry, BeneficiaryReader, DonationLedger, LedgerReceipt, LedgerRecord,
    SponsorshipRequest, SupplyRequest,
};

#[derive(Default)]
pub struct FixtureBackend {
    children: Vec<Beneficiary>,
    orphanages: Vec<Orphanage>,
    fail_writes: bool,
    child_search_calls: AtomicUsize,
    orphanage_search_calls: AtomicUsize,
    submitted: Mutex<Vec<LedgerRecord>>,
    funding_updates: Mutex<Vec<(String, f64)>>,
    sponsorships: Mutex<Vec<SponsorshipRequest>>,
    supply_requests: Mutex<Vec<SupplyRequest>>,
    audit: Mutex<Vec<AuditEntry>>,
}

impl FixtureBackend {
    /// The standard fixture pool: five children, three orphanages.
    pub fn new() -> Self {
        Self {
            children: fixture_children(),
            orphanages: fixture_orphanages(),
            ..Default::default()
        }
    }

    /// A fixture serving a custom beneficiary pool.
    pub fn with_children(children: Vec<Beneficiary>) -> Self {
        Self {
            children,
            orphanages: fixture_orphanages(),
            ..Default::default()
        }
    }

    /// Make every ledger write fail, for execution-failure paths.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn child_search_calls(&self) -> usize {
        self.child_search_calls.load(Ordering::SeqCst)
    }

    pub fn orphanage_search_calls(&self) -> usize {
        self.orphanage_search_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<LedgerRecord> {
        self.submitted.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn funding_updates(&self) -> Vec<(String, f64)> {
        self.funding_updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn sponsorships(&self) -> Vec<SponsorshipRequest> {
        self.sponsorships
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn supply_requests(&self) -> Vec<SupplyRequest> {
        self.supply_requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl BeneficiaryReader for FixtureBackend {
    async fn search_children(
        &self,
        category: Option<&str>,
        max_results: usize,
        urgent_only: bool,
    ) -> Result<Vec<Beneficiary>> {
        self.child_search_calls.fetch_add(1, Ordering::SeqCst);
        let mut matches: Vec<Beneficiary> = self
            .children
            .iter()
            .filter(|child| category.map_or(true, |c| child.category == c))
            .filter(|child| !urgent_only || child.urgent)
            .cloned()
            .collect();
        matches.truncate(max_results);
        Ok(matches)
    }

    async fn search_orphanages(
        &self,
        supply_type: Option<&str>,
        urgent_only: bool,
        max_results: usize,
    ) -> Result<Vec<Orphanage>> {
        self.orphanage_search_calls.fetch_add(1, Ordering::SeqCst);
        let mut matches: Vec<Orphanage> = self
            .orphanages
            .iter()
            .filter(|orphanage| {
                supply_type.map_or(true, |item| {
                    orphanage.supplies_needed.iter().any(|need| need.item == item)
                })
            })
            .filter(|orphanage| !urgent_only || orphanage.urgent)
            .cloned()
            .collect();
        matches.truncate(max_results);
        Ok(matches)
    }
}

#[async_trait]
impl DonationLedger for FixtureBackend {
    async fn submit(&self, record: &LedgerRecord) -> Result<LedgerReceipt> {
        if self.fail_writes {
            return Err(anyhow!("fixture ledger configured to fail"));
        }
        self.submitted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(LedgerReceipt {
            transaction_id: record.transaction_id.clone(),
            timestamp: Some(Utc::now()),
        })
    }

    async fn update_funding_status(
        &self,
        beneficiary_id: &str,
        amount_added: f64,
        _transaction_id: &str,
    ) -> Result<()> {
        if self.fail_writes {
            return Err(anyhow!("fixture ledger configured to fail"));
        }
        self.funding_updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((beneficiary_id.to_string(), amount_added));
        Ok(())
    }

    async fn create_sponsorship(&self, request: &SponsorshipRequest) -> Result<String> {
        if self.fail_writes {
            return Err(anyhow!("fixture ledger configured to fail"));
        }
        self.sponsorships
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        let suffix = request
            .transaction_id
            .strip_prefix("txn_")
            .unwrap_or(&request.transaction_id);
        Ok(format!("spon_{suffix}"))
    }

    async fn create_supply_request(&self, request: &SupplyRequest) -> Result<String> {
        if self.fail_writes {
            return Err(anyhow!("fixture ledger configured to fail"));
        }
        self.supply_requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        let suffix = request
            .transaction_id
            .strip_prefix("txn_")
            .unwrap_or(&request.transaction_id);
        Ok(format!("sup_{suffix}"))
    }

    async fn log_donation(&self, entry: &AuditEntry) {
        self.audit
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
    }
}

fn fixture_children() -> Vec<Beneficiary> {
    vec![
        Beneficiary {
            id: "child_001".into(),
            name: "Arjun Kumar".into(),
            age: Some(10),
            category: "education".into(),
            funding_needed: 8000.0,
            funding_received: 2000.0,
            urgency_score: 0.9,
            urgent: true,
            story: "Arjun lost his father last year. He is a bright student but cannot \
                    afford books and school fees."
                .into(),
            location: "Mumbai".into(),
            items_needed: vec!["books".into(), "uniform".into(), "school fees".into()],
        },
        Beneficiary {
            id: "child_002".into(),
            name: "Priya Sharma".into(),
            age: Some(8),
            category: "medical".into(),
            funding_needed: 25000.0,
            funding_received: 5000.0,
            urgency_score: 0.95,
            urgent: true,
            story: "Priya has been diagnosed with a heart condition and needs surgery \
                    within 3 months."
                .into(),
            location: "Delhi".into(),
            items_needed: vec!["surgery fund".into(), "medication".into()],
        },
        Beneficiary {
            id: "child_003".into(),
            name: "Ravi Nair".into(),
            age: Some(12),
            category: "education".into(),
            funding_needed: 6000.0,
            funding_received: 1000.0,
            urgency_score: 0.75,
            urgent: false,
            story: "Ravi is a talented artist who wants to continue school but his \
                    family struggles to pay fees."
                .into(),
            location: "Chennai".into(),
            items_needed: vec!["school fees".into(), "art supplies".into()],
        },
        Beneficiary {
            id: "child_004".into(),
            name: "Fatima Shaikh".into(),
            age: Some(9),
            category: "sponsorship".into(),
            funding_needed: 1500.0,
            funding_received: 0.0,
            urgency_score: 0.8,
            urgent: true,
            story: "Fatima lives in an orphanage and needs monthly support for \
                    education and meals."
                .into(),
            location: "Hyderabad".into(),
            items_needed: vec!["monthly meals".into(), "school fees".into(), "clothing".into()],
        },
        Beneficiary {
            id: "child_005".into(),
            name: "Suresh Patel".into(),
            age: Some(11),
            category: "education".into(),
            funding_needed: 4500.0,
            funding_received: 500.0,
            urgency_score: 0.7,
            urgent: false,
            story: "Suresh is in 6th grade and dreams of becoming an engineer. He \
                    needs help with tuition fees."
                .into(),
            location: "Ahmedabad".into(),
            items_needed: vec!["tuition fees".into(), "books".into()],
        },
    ]
}

fn fixture_orphanages() -> Vec<Orphanage> {
    vec![
        Orphanage {
            id: "orphanage_001".into(),
            name: "Sunshine Children's Home".into(),
            location: "Delhi".into(),
            urgency_score: 0.95,
            urgent: true,
            children_count: 45,
            supplies_needed: vec![
                SupplyNeed {
                    item: "blankets".into(),
                    quantity: 50,
                    estimated_cost: 7500.0,
                },
                SupplyNeed {
                    item: "books".into(),
                    quantity: 40,
                    estimated_cost: 4000.0,
                },
            ],
            verified: true,
        },
        Orphanage {
            id: "orphanage_002".into(),
            name: "Hope Foundation".into(),
            location: "Mumbai".into(),
            urgency_score: 0.85,
            urgent: true,
            children_count: 30,
            supplies_needed: vec![
                SupplyNeed {
                    item: "uniforms".into(),
                    quantity: 30,
                    estimated_cost: 9000.0,
                },
                SupplyNeed {
                    item: "stationery".into(),
                    quantity: 30,
                    estimated_cost: 3000.0,
                },
            ],
            verified: true,
        },
        Orphanage {
            id: "orphanage_003".into(),
            name: "Rainbow Care Home".into(),
            location: "Chennai".into(),
            urgency_score: 0.7,
            urgent: false,
            children_count: 20,
            supplies_needed: vec![
                SupplyNeed {
                    item: "food".into(),
                    quantity: 1,
                    estimated_cost: 15000.0,
                },
                SupplyNeed {
                    item: "mattresses".into(),
                    quantity: 10,
                    estimated_cost: 8000.0,
                },
            ],
            verified: true,
        },
    ]
}
