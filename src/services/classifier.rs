// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Waste image classification.
//!
//! [`Classifier`] is implemented by an in-process mock that produces random
//! plausible results and by a client for the remote AI service.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::AppError;
use crate::models::{Coordinates, Urgency, WasteType};
use crate::services::ai_client::{AiServiceClient, AiServiceError};

/// Disposal method that marks hazardous waste.
pub const SPECIAL_COLLECTION: &str = "special collection";

/// Classifier output for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Classification {
    #[serde(rename = "type")]
    pub waste_type: WasteType,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub urgency: Urgency,
    /// Kilograms
    pub estimated_weight: f64,
    /// Credits the item is worth if collected
    pub carbon_value: u32,
    pub recyclable: bool,
    pub disposal_method: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("image URL must be http(s): {0}")]
    InvalidImage(String),

    #[error(transparent)]
    Service(#[from] AiServiceError),
}

impl From<ClassifierError> for AppError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::InvalidImage(_) => AppError::BadRequest(err.to_string()),
            ClassifierError::Service(e) => AppError::Classifier(e.to_string()),
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        image_url: &str,
        coordinates: Option<Coordinates>,
    ) -> Result<Classification, ClassifierError>;
}

fn check_image_url(image_url: &str) -> Result<(), ClassifierError> {
    if image_url.starts_with("https://") || image_url.starts_with("http://") {
        Ok(())
    } else {
        Err(ClassifierError::InvalidImage(image_url.to_string()))
    }
}

fn disposal_for(waste_type: WasteType) -> &'static str {
    match waste_type {
        WasteType::Plastic => "recycling",
        WasteType::Organic => "composting",
        WasteType::Electronic => "e-waste recycling",
        WasteType::Hazardous => SPECIAL_COLLECTION,
        WasteType::Construction => "construction debris removal",
        WasteType::Other => "general collection",
    }
}

fn recommendations_for(waste_type: WasteType) -> Vec<String> {
    let tips: &[&str] = match waste_type {
        WasteType::Plastic => &[
            "Rinse containers before recycling",
            "Separate bottle caps from bottles",
        ],
        WasteType::Organic => &[
            "Compost at home or at a community garden",
            "Keep organic waste away from plastics",
        ],
        WasteType::Electronic => &[
            "Take devices to a certified e-waste collector",
            "Remove batteries before disposal",
        ],
        WasteType::Hazardous => &[
            "Do not touch or move the material",
            "Keep children and animals away until collected",
        ],
        WasteType::Construction => &[
            "Reuse bricks and timber where possible",
            "Book a licensed debris removal service",
        ],
        WasteType::Other => &["Bag the waste securely for general collection"],
    };
    tips.iter().map(|t| t.to_string()).collect()
}

/// Random plausible classifications.
#[derive(Debug, Default, Clone)]
pub struct MockClassifier;

impl MockClassifier {
    /// Draw a classification. Kept synchronous so the RNG never lives across
    /// an await point.
    pub fn sample<R: Rng>(rng: &mut R) -> Classification {
        let waste_type = *WasteType::ALL
            .choose(rng)
            .unwrap_or(&WasteType::Other);
        let confidence = rng.gen_range(0.70..=1.0);
        let urgency = if waste_type == WasteType::Hazardous {
            Urgency::High
        } else {
            *[Urgency::Low, Urgency::Medium, Urgency::High]
                .choose(rng)
                .unwrap_or(&Urgency::Medium)
        };
        let estimated_weight = (rng.gen_range(0.5..25.0_f64) * 10.0).round() / 10.0;
        let recyclable = matches!(
            waste_type,
            WasteType::Plastic | WasteType::Electronic | WasteType::Organic
        );

        Classification {
            waste_type,
            confidence,
            urgency,
            estimated_weight,
            carbon_value: crate::services::lifecycle::credits_for(waste_type, urgency),
            recyclable,
            disposal_method: disposal_for(waste_type).to_string(),
            recommendations: recommendations_for(waste_type),
        }
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(
        &self,
        image_url: &str,
        _coordinates: Option<Coordinates>,
    ) -> Result<Classification, ClassifierError> {
        check_image_url(image_url)?;
        let classification = Self::sample(&mut rand::thread_rng());
        tracing::debug!(
            waste_type = classification.waste_type.as_str(),
            confidence = classification.confidence,
            "Mock classification"
        );
        Ok(classification)
    }
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    image_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    coordinates: Option<Coordinates>,
}

/// Classification through `POST {AI_SERVICE_URL}/classify/waste`.
#[derive(Clone)]
pub struct RemoteClassifier {
    client: AiServiceClient,
}

impl RemoteClassifier {
    pub fn new(client: AiServiceClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Classifier for RemoteClassifier {
    async fn classify(
        &self,
        image_url: &str,
        coordinates: Option<Coordinates>,
    ) -> Result<Classification, ClassifierError> {
        check_image_url(image_url)?;
        let mut classification: Classification = self
            .client
            .post_json(
                "/classify/waste",
                &ClassifyRequest {
                    image_url,
                    coordinates,
                },
            )
            .await?;
        // Service output is untrusted
        classification.confidence = classification.confidence.clamp(0.0, 1.0);
        if classification.waste_type == WasteType::Hazardous {
            classification.urgency = Urgency::High;
        }
        Ok(classification)
    }
}
