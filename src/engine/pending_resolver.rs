// ==========================================
// 学年结转引擎 - 欠科结清
// ==========================================
// 状态: pendiente → aprobada | convalidada（终态不可再变）
// 红线: 不回写源学年的学年结果
// ==========================================

use crate::domain::outcome::PendingSubject;
use crate::domain::types::PendingSubjectStatus;
use crate::engine::error::{ClosureError, ClosureResult};
use crate::repository::{PendingSubjectRepository, RepositoryError};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct PendingSubjectResolver {
    pending_repo: Arc<PendingSubjectRepository>,
}

impl PendingSubjectResolver {
    pub fn new(pending_repo: Arc<PendingSubjectRepository>) -> Self {
        Self { pending_repo }
    }

    /// 登记欠科结果
    ///
    /// # 错误
    /// - InvalidStateTransition: 目标为 pendiente，或欠科已处理
    /// - NotFound: 欠科不存在
    #[instrument(skip(self, status), fields(status = %status))]
    pub fn resolve(
        &self,
        pending_subject_id: &str,
        status: PendingSubjectStatus,
        resolved_by: &str,
    ) -> ClosureResult<PendingSubject> {
        if !status.is_resolved() {
            return Err(ClosureError::InvalidStateTransition {
                from: PendingSubjectStatus::Pendiente.to_string(),
                to: status.to_string(),
            });
        }

        let resolved_at = chrono::Utc::now().naive_utc();
        self.pending_repo
            .update_resolution(pending_subject_id, status, resolved_by, resolved_at)
            .map_err(|e| match e {
                RepositoryError::InvalidStateTransition { from, to } => {
                    ClosureError::InvalidStateTransition { from, to }
                }
                RepositoryError::NotFound { entity, id } => {
                    ClosureError::NotFound { entity, id }
                }
                other => ClosureError::Repository(other),
            })?;

        let pending = self
            .pending_repo
            .find_by_id(pending_subject_id)?
            .ok_or_else(|| ClosureError::NotFound {
                entity: "PendingSubject".to_string(),
                id: pending_subject_id.to_string(),
            })?;

        info!(
            pending_subject_id,
            subject_id = %pending.subject_id,
            resolved_by,
            "欠科已结清"
        );
        Ok(pending)
    }

    pub fn list_for_inscription(&self, inscription_id: &str) -> ClosureResult<Vec<PendingSubject>> {
        Ok(self.pending_repo.find_by_new_inscription(inscription_id)?)
    }
}
