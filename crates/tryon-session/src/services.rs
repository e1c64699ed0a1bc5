//! Demo lookup services shown next to the try-on view
//!
//! Both services work over fixed demo data behind an artificial delay.
//! Minting adds tokens to the ledger; nothing here touches the session state.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use tryon_core::{Category, ProductId};
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("No record for {0}")]
    NotFound(String),
}

/// Provenance record of a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticityRecord {
    pub product: ProductId,
    pub manufacturer: String,
    pub production_date: NaiveDate,
    pub serial_number: String,
    pub materials: Vec<String>,
    pub transaction_hash: String,
}

/// Ownership token for a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipToken {
    pub token_id: String,
    pub product: ProductId,
    pub owner: String,
    pub mint_date: NaiveDate,
    pub transaction_hash: String,
}

const DEMO_WALLET: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";
const DEFAULT_LEDGER_DELAY: Duration = Duration::from_millis(1000);
const DEFAULT_ADVISOR_DELAY: Duration = Duration::from_millis(500);

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

/// Mock product authenticity ledger
pub struct AuthenticityLedger {
    records: Vec<AuthenticityRecord>,
    tokens: RwLock<Vec<OwnershipToken>>,
    delay: Duration,
}

impl Default for AuthenticityLedger {
    fn default() -> Self {
        Self::demo()
    }
}

impl AuthenticityLedger {
    /// Ledger preloaded with the demo records
    pub fn demo() -> Self {
        let record = |id: &str, manufacturer: &str, produced: NaiveDate, serial: &str, materials: &[&str], tx: &str| {
            AuthenticityRecord {
                product: ProductId::new(id),
                manufacturer: manufacturer.to_string(),
                production_date: produced,
                serial_number: serial.to_string(),
                materials: materials.iter().map(|m| m.to_string()).collect(),
                transaction_hash: tx.to_string(),
            }
        };

        let records = vec![
            record(
                "glasses-1",
                "LuxuryEyewear Inc.",
                date(2023, 5, 15),
                "LX-AV-2023-001",
                &["Titanium", "CR-39 Lenses"],
                "0x8a7d953f45d5d9b7e5b5c6d7a8f9e1d2c3b4a5e6f7a8b9c0d1e2f3a4b5c6d7e8",
            ),
            record(
                "glasses-2",
                "ModernVision Co.",
                date(2023, 6, 22),
                "MV-RD-2023-042",
                &["Acetate", "Polycarbonate Lenses"],
                "0x1e2d3c4b5a6f7e8d9c0b1a2f3e4d5c6b7a8f9e0d1c2b3a4f5e6d7c8b9a0f1e2d",
            ),
            record(
                "shirt-1",
                "EcoFashion Apparel",
                date(2023, 4, 10),
                "EF-CT-2023-128",
                &["Organic Cotton"],
                "0x3a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f7a8b9c0d1e2f3a4",
            ),
        ];

        let tokens = vec![
            OwnershipToken {
                token_id: "1".to_string(),
                product: ProductId::new("glasses-1"),
                owner: DEMO_WALLET.to_string(),
                mint_date: date(2023, 7, 15),
                transaction_hash: "0x9a8b7c6d5e4f3a2b1c0d9e8f7a6b5c4d3e2f1a0b9c8d7e6f5a4b3c2d1e0f9a8".to_string(),
            },
            OwnershipToken {
                token_id: "2".to_string(),
                product: ProductId::new("shirt-2"),
                owner: DEMO_WALLET.to_string(),
                mint_date: date(2023, 8, 2),
                transaction_hash: "0x1a2b3c4d5e6f7a8b9c0d1e2f3a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d9e0f1a2".to_string(),
            },
        ];

        Self {
            records,
            tokens: RwLock::new(tokens),
            delay: DEFAULT_LEDGER_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Look up the provenance record of a product
    pub async fn verify(&self, product_id: &str) -> Result<AuthenticityRecord, LookupError> {
        tokio::time::sleep(self.delay).await;
        let found = self.records.iter().find(|r| r.product.as_str() == product_id).cloned();
        debug!(product = product_id, verified = found.is_some(), "Authenticity lookup");
        found.ok_or_else(|| LookupError::NotFound(product_id.to_string()))
    }

    /// Tokens held by a wallet; addresses compare case-insensitively
    pub async fn nfts_for(&self, wallet: &str) -> Vec<OwnershipToken> {
        tokio::time::sleep(self.delay).await;
        self.tokens
            .read()
            .await
            .iter()
            .filter(|t| t.owner.eq_ignore_ascii_case(wallet))
            .cloned()
            .collect()
    }

    /// Address of the demo wallet
    pub fn demo_wallet(&self) -> &'static str {
        DEMO_WALLET
    }

    /// Connect the demo wallet and return its address
    pub async fn connect_wallet(&self) -> String {
        tokio::time::sleep(self.delay).await;
        info!(wallet = DEMO_WALLET, "Wallet connected");
        DEMO_WALLET.to_string()
    }

    /// Mint an ownership token for a product with a provenance record
    pub async fn mint(&self, product_id: &str, wallet: &str) -> Result<OwnershipToken, LookupError> {
        tokio::time::sleep(self.delay).await;
        if !self.records.iter().any(|r| r.product.as_str() == product_id) {
            return Err(LookupError::NotFound(product_id.to_string()));
        }

        let mut tokens = self.tokens.write().await;
        let token = OwnershipToken {
            token_id: (tokens.len() + 1).to_string(),
            product: ProductId::new(product_id),
            owner: wallet.to_string(),
            mint_date: Utc::now().date_naive(),
            transaction_hash: format!("0x{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
        };
        info!(
            product = product_id,
            token = %token.token_id,
            owner = wallet,
            "Ownership token minted"
        );
        tokens.push(token.clone());
        Ok(token)
    }
}

/// Body measurements in centimeters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyMeasurements {
    pub shoulder_width: f64,
    pub chest_circumference: f64,
    pub waist_circumference: f64,
    pub hip_circumference: f64,
    pub arm_length: f64,
    pub inseam: f64,
    pub height: f64,
}

/// Face measurements in centimeters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceMeasurements {
    pub face_width: f64,
    pub face_height: f64,
    pub interpupillary_distance: f64,
    pub nose_width: f64,
    pub nose_height: f64,
    pub eye_size: f64,
    pub temple_length: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Size {
    S,
    M,
    L,
    XL,
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::S => "S",
            Self::M => "M",
            Self::L => "L",
            Self::XL => "XL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product: ProductId,
    pub name: String,
    pub price: f64,
    pub confidence: f64,
    pub reason: String,
}

/// Mock fit and recommendation service
pub struct FitAdvisor {
    delay: Duration,
}

impl Default for FitAdvisor {
    fn default() -> Self {
        Self {
            delay: DEFAULT_ADVISOR_DELAY,
        }
    }
}

impl FitAdvisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Size for a product given body measurements. Only apparel is sized by
    /// chest circumference.
    pub async fn recommend_size(&self, product_id: &str, measurements: &BodyMeasurements) -> Size {
        tokio::time::sleep(self.delay).await;
        if !Category::from_product_id(product_id).is_apparel() {
            return Size::M;
        }
        match measurements.chest_circumference {
            c if c < 90.0 => Size::S,
            c if c < 100.0 => Size::M,
            c if c < 110.0 => Size::L,
            _ => Size::XL,
        }
    }

    /// Suggested products for a user
    pub async fn recommendations(&self, user: &str) -> Vec<Recommendation> {
        tokio::time::sleep(self.delay).await;
        debug!(user = user, "Serving recommendations");

        let rec = |id: &str, name: &str, price: f64, confidence: f64, reason: &str| Recommendation {
            product: ProductId::new(id),
            name: name.to_string(),
            price,
            confidence,
            reason: reason.to_string(),
        };
        vec![
            rec(
                "glasses-3",
                "Vintage Square",
                119.99,
                0.92,
                "Based on your interest in aviator styles",
            ),
            rec("shirt-1", "Casual T-Shirt", 39.99, 0.87, "Matches your casual style preference"),
            rec("jacket-1", "Denim Jacket", 129.99, 0.81, "Complements your recent purchases"),
        ]
    }

    /// Face measurements for glasses fitting
    pub async fn analyze_face(&self, _frame: &tryon_capture::Frame) -> FaceMeasurements {
        tokio::time::sleep(self.delay).await;
        FaceMeasurements {
            face_width: 14.2,
            face_height: 18.7,
            interpupillary_distance: 6.3,
            nose_width: 3.5,
            nose_height: 5.1,
            eye_size: 2.4,
            temple_length: 10.8,
        }
    }

    /// Body measurements for apparel fitting
    pub async fn analyze_body(&self, _frame: &tryon_capture::Frame) -> BodyMeasurements {
        tokio::time::sleep(self.delay).await;
        BodyMeasurements {
            shoulder_width: 45.2,
            chest_circumference: 98.5,
            waist_circumference: 82.3,
            hip_circumference: 94.7,
            arm_length: 65.1,
            inseam: 78.4,
            height: 175.6,
        }
    }
}
