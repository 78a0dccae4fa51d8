use crate::detect::{Detection, DetectionClass};

/// Aggregated statistics for one class.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassSummary {
    pub class: DetectionClass,
    pub count: usize,
    pub confidences: Vec<f32>,
}

impl ClassSummary {
    fn new(class: DetectionClass) -> Self {
        Self {
            class,
            count: 0,
            confidences: Vec::new(),
        }
    }

    /// Mean confidence, or 0 when the class has no detections.
    pub fn average_confidence(&self) -> f64 {
        if self.confidences.is_empty() {
            return 0.0;
        }
        let total: f64 = self.confidences.iter().map(|c| f64::from(*c)).sum();
        total / self.confidences.len() as f64
    }
}

/// Per-class summaries in the fixed `DetectionClass::ALL` order.
#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    classes: Vec<ClassSummary>,
}

impl Summary {
    pub fn from_detections(detections: &[Detection]) -> Self {
        let mut classes: Vec<ClassSummary> =
            DetectionClass::ALL.into_iter().map(ClassSummary::new).collect();
        for det in detections {
            if let Some(entry) = classes.iter_mut().find(|s| s.class == det.class) {
                entry.count += 1;
                entry.confidences.push(det.confidence);
            }
        }
        Self { classes }
    }

    pub fn classes(&self) -> &[ClassSummary] {
        &self.classes
    }

    pub fn get(&self, class: DetectionClass) -> &ClassSummary {
        self.classes
            .iter()
            .find(|s| s.class == class)
            .unwrap_or_else(|| unreachable!("every class has a summary"))
    }

    pub fn count(&self, class: DetectionClass) -> usize {
        self.get(class).count
    }

    pub fn total(&self) -> usize {
        self.classes.iter().map(|s| s.count).sum()
    }
}
