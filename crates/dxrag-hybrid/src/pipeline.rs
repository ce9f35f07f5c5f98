use std::sync::Arc;

use dxrag_core::traits::DiagnosisGenerator;
use dxrag_core::{Diagnosis, Result};
use tracing::info;

use crate::context::RetrievalContext;
use crate::diagnosis::RetrievalDiagnoser;

/// Symptoms in, ranked diagnoses out.
pub struct DiagnosisPipeline {
    context: Arc<RetrievalContext>,
    generator: Box<dyn DiagnosisGenerator>,
}

impl DiagnosisPipeline {
    pub fn new(context: Arc<RetrievalContext>, generator: Box<dyn DiagnosisGenerator>) -> Self {
        Self { context, generator }
    }

    pub fn retrieval_only(context: Arc<RetrievalContext>) -> Self {
        Self::new(context, Box::new(RetrievalDiagnoser))
    }

    pub fn diagnose(&self, symptoms: &str, top_n: usize) -> Result<Vec<Diagnosis>> {
        let passages = self.context.retrieve(symptoms)?;
        let diagnoses = self.generator.generate(symptoms, &passages, top_n)?;
        info!(passages = passages.len(), diagnoses = diagnoses.len(), "diagnosis complete");
        Ok(diagnoses)
    }
}
