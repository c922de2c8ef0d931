//! Analysis orchestrator.
//!
//! Prepares the image(s), wraps them in an [`AnalysisRequest`] and hands the
//! request to the engine. All retry and validation logic lives in
//! [`crate::engine`]; this layer only adds preparation.

use crate::config::ClientConfig;
use crate::engine::{AnalysisEngine, EngineEvent, EngineSettings};
use crate::error::AnalysisError;
use crate::imaging::{PrepareSettings, prepare};
use crate::model::{AnalysisRequest, AnalysisResult};
use crate::transport::{ConnectivityProbe, ReqwestTransport, TcpProbe, Transport};
use image::DynamicImage;
use std::sync::mpsc::Sender;
use tracing::warn;

pub struct CoinAnalysisService<T, P> {
    engine: AnalysisEngine<T, P>,
    prepare: PrepareSettings,
}

/// The production service: reqwest transport and TCP connectivity probe.
pub type HttpAnalysisService = CoinAnalysisService<ReqwestTransport, TcpProbe>;

impl HttpAnalysisService {
    pub fn from_config(config: &ClientConfig) -> Result<Self, AnalysisError> {
        let transport = ReqwestTransport::from_config(config)?;
        let probe = TcpProbe::for_base_url(&config.backend.base_url)?;
        let engine = AnalysisEngine::new(transport, probe, EngineSettings::from_config(config));
        Ok(Self::new(engine, PrepareSettings::from_config(config)))
    }
}

impl<T: Transport, P: ConnectivityProbe> CoinAnalysisService<T, P> {
    pub fn new(engine: AnalysisEngine<T, P>, prepare: PrepareSettings) -> Self {
        Self { engine, prepare }
    }

    /// Forward engine progress events to `sender`.
    pub fn with_events(self, sender: Sender<EngineEvent>) -> Self {
        Self {
            engine: self.engine.with_events(sender),
            prepare: self.prepare,
        }
    }

    pub fn engine(&self) -> &AnalysisEngine<T, P> {
        &self.engine
    }

    /// Identify a coin from one photo.
    pub async fn analyze_single(&self, image: DynamicImage) -> Result<AnalysisResult, AnalysisError> {
        let settings = self.prepare;
        let encoded = off_runtime(move || prepare(&image, &settings)).await?;
        let request = AnalysisRequest::Single(encoded);
        Ok(self.engine.analyze(&request).await?.analysis)
    }

    /// Identify a coin from photos of both faces.
    ///
    /// The two sides are prepared in parallel on the rayon pool.
    pub async fn analyze_both_sides(
        &self,
        front: DynamicImage,
        back: DynamicImage,
    ) -> Result<AnalysisResult, AnalysisError> {
        let settings = self.prepare;
        let (front, back) = off_runtime(move || {
            let (front, back) = rayon::join(
                || prepare(&front, &settings),
                || prepare(&back, &settings),
            );
            Ok((front?, back?))
        })
        .await?;
        let request = AnalysisRequest::BothSides { front, back };
        Ok(self.engine.analyze(&request).await?.analysis)
    }
}

/// Run CPU-bound preparation on tokio's blocking pool so the caller's
/// worker thread keeps polling other tasks.
async fn off_runtime<R, F>(work: F) -> Result<R, AnalysisError>
where
    F: FnOnce() -> Result<R, AnalysisError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        warn!(error = %e, "image preparation task failed");
        AnalysisError::InvalidRequest(format!("image preparation task failed: {e}"))
    })?
}
