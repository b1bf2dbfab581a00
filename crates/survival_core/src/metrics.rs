//! Binary classification metrics
//!
//! Labels are 0/1, predictions are positive-class probabilities.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{CoreError, Result};

const LOG_LOSS_EPSILON: f64 = 1e-15;

fn check_inputs(probabilities: &[f64], labels: &[u8]) -> Result<()> {
    if probabilities.len() != labels.len() {
        return Err(CoreError::InvalidInput(format!(
            "{} predictions for {} labels",
            probabilities.len(),
            labels.len()
        )));
    }
    if probabilities.is_empty() {
        return Err(CoreError::InvalidInput("no predictions to evaluate".to_string()));
    }
    if let Some(bad) = labels.iter().find(|&&l| l > 1) {
        return Err(CoreError::InvalidInput(format!("label {} is not binary", bad)));
    }
    Ok(())
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Counts of a thresholded binary prediction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn compute(probabilities: &[f64], labels: &[u8], threshold: f64) -> Result<Self> {
        check_inputs(probabilities, labels)?;

        let mut cm = Self::default();
        for (&p, &y) in probabilities.iter().zip(labels) {
            match (p >= threshold, y == 1) {
                (true, true) => cm.tp += 1,
                (true, false) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (false, true) => cm.fn_ += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.tn, self.tn + self.fp)
    }

    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

/// Area under the ROC curve via the rank-sum statistic
///
/// Tied scores receive their average rank. Returns 0.5 when only one class
/// is present.
pub fn roc_auc(probabilities: &[f64], labels: &[u8]) -> Result<f64> {
    check_inputs(probabilities, labels)?;

    let n = probabilities.len();
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Ok(0.5);
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    // Ascending ranks, 1-based, averaged over ties
    let mut rank_sum_pos = 0.0f64;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && probabilities[order[j]] == probabilities[order[i]] {
            j += 1;
        }

        let avg_rank = (i + 1 + j) as f64 / 2.0;
        rank_sum_pos += avg_rank * order[i..j].iter().filter(|&&idx| labels[idx] == 1).count() as f64;

        i = j;
    }

    let n_pos_f = n_pos as f64;
    Ok((rank_sum_pos - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg as f64))
}

/// Mean binary cross-entropy
pub fn log_loss(probabilities: &[f64], labels: &[u8]) -> Result<f64> {
    check_inputs(probabilities, labels)?;

    let total: f64 = probabilities
        .iter()
        .zip(labels)
        .map(|(&p, &y)| {
            let p = p.clamp(LOG_LOSS_EPSILON, 1.0 - LOG_LOSS_EPSILON);
            if y == 1 {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();

    Ok(total / probabilities.len() as f64)
}

/// All evaluation metrics for one model on one split
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    pub samples: usize,
    pub positives: usize,
    pub threshold: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub specificity: f64,
    pub f1: f64,
    pub roc_auc: f64,
    pub log_loss: f64,
    pub confusion: ConfusionMatrix,
}

impl EvaluationReport {
    pub fn compute(probabilities: &[f64], labels: &[u8], threshold: f64) -> Result<Self> {
        let confusion = ConfusionMatrix::compute(probabilities, labels, threshold)?;

        Ok(Self {
            samples: labels.len(),
            positives: labels.iter().filter(|&&l| l == 1).count(),
            threshold,
            accuracy: confusion.accuracy(),
            precision: confusion.precision(),
            recall: confusion.recall(),
            specificity: confusion.specificity(),
            f1: confusion.f1(),
            roc_auc: roc_auc(probabilities, labels)?,
            log_loss: log_loss(probabilities, labels)?,
            confusion,
        })
    }

    /// Emit the report through tracing
    pub fn log(&self, label: &str) {
        info!("{} ({} samples, {} positive):", label, self.samples, self.positives);
        info!("  Accuracy:    {:.4}", self.accuracy);
        info!("  Precision:   {:.4}", self.precision);
        info!("  Recall:      {:.4}", self.recall);
        info!("  Specificity: {:.4}", self.specificity);
        info!("  F1:          {:.4}", self.f1);
        info!("  ROC AUC:     {:.4}", self.roc_auc);
        info!("  Log loss:    {:.4}", self.log_loss);
        info!("  Confusion matrix (threshold {:.2}):", self.threshold);
        info!("                 pred 0   pred 1");
        info!("    actual 0   {:>7}  {:>7}", self.confusion.tn, self.confusion.fp);
        info!("    actual 1   {:>7}  {:>7}", self.confusion.fn_, self.confusion.tp);
    }
}
