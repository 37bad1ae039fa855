//! Record traits binding each struct to its collection

use crate::{
    AuthorizationGrant, CatalogKind, Collection, FeatureSet, JobKind, JobStage, Model,
    Prediction, Project, User,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A struct stored in exactly one collection under its `id`.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn key(&self) -> &str;
}

/// A record that belongs to a project and can be listed by the catalog.
///
/// For projects the owning project key is the record's own `id`.
pub trait ProjectScoped: Record {
    const KIND: CatalogKind;

    fn project_key(&self) -> &str;
    fn name(&self) -> &str;
}

/// An artifact whose contents are produced by an external process.
pub trait JobRecord: ProjectScoped {
    const JOB_KIND: JobKind;

    fn pid(&self) -> Option<&str>;
    fn err_msg(&self) -> Option<&str>;
    fn has_success_payload(&self) -> bool;

    /// Stage derived from the fields present. An error wins over a
    /// success payload stored alongside it.
    fn stage(&self) -> JobStage {
        if self.err_msg().is_some() {
            JobStage::Failed
        } else if self.has_success_payload() {
            JobStage::Succeeded
        } else if self.pid().is_some() {
            JobStage::Running
        } else {
            JobStage::Pending
        }
    }
}

impl Record for Project {
    const COLLECTION: Collection = Collection::Projects;

    fn key(&self) -> &str {
        &self.id
    }
}

impl ProjectScoped for Project {
    const KIND: CatalogKind = CatalogKind::Projects;

    fn project_key(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;

    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for AuthorizationGrant {
    const COLLECTION: Collection = Collection::UserAuth;

    fn key(&self) -> &str {
        &self.id
    }
}

macro_rules! impl_job_record {
    ($ty:ty, $collection:expr, $kind:expr, $job_kind:expr, |$rec:ident| $success:expr) => {
        impl Record for $ty {
            const COLLECTION: Collection = $collection;

            fn key(&self) -> &str {
                &self.id
            }
        }

        impl ProjectScoped for $ty {
            const KIND: CatalogKind = $kind;

            fn project_key(&self) -> &str {
                &self.projkey
            }

            fn name(&self) -> &str {
                &self.name
            }
        }

        impl JobRecord for $ty {
            const JOB_KIND: JobKind = $job_kind;

            fn pid(&self) -> Option<&str> {
                self.pid.as_deref()
            }

            fn err_msg(&self) -> Option<&str> {
                self.err_msg.as_deref()
            }

            fn has_success_payload(&self) -> bool {
                let $rec = self;
                $success
            }
        }
    };
}

impl_job_record!(
    FeatureSet,
    Collection::Features,
    CatalogKind::FeatureSets,
    JobKind::FeatureSet,
    |rec| rec.results_msg.is_some()
);
impl_job_record!(
    Model,
    Collection::Models,
    CatalogKind::Models,
    JobKind::Model,
    |rec| rec.results_msg.is_some()
);
impl_job_record!(
    Prediction,
    Collection::Predictions,
    CatalogKind::Predictions,
    JobKind::Prediction,
    |rec| rec.results_str_html.is_some()
);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_test_featureset() -> FeatureSet {
        FeatureSet {
            id: "f1".to_string(),
            projkey: "p1".to_string(),
            name: "fs".to_string(),
            created: Utc::now(),
            featlist: vec!["amplitude".to_string()],
            meta_feats: vec![],
            pid: None,
            results_msg: None,
            err_msg: None,
        }
    }

    #[test]
    fn test_stage_progression() {
        let mut fs = make_test_featureset();
        assert_eq!(fs.stage(), JobStage::Pending);

        fs.pid = Some("9999".to_string());
        assert_eq!(fs.stage(), JobStage::Running);

        fs.results_msg = Some("done".to_string());
        assert_eq!(fs.stage(), JobStage::Succeeded);
    }

    #[test]
    fn test_error_wins_over_success() {
        let mut fs = make_test_featureset();
        fs.pid = Some("9999".to_string());
        fs.results_msg = Some("MSG".to_string());
        fs.err_msg = Some("ERR_MSG".to_string());
        assert_eq!(fs.stage(), JobStage::Failed);
    }

    #[test]
    fn test_project_scope_is_own_id() {
        let project = Project {
            id: "p9".to_string(),
            name: "TEST".to_string(),
            description: String::new(),
        };
        assert_eq!(project.project_key(), "p9");
        assert_eq!(Project::COLLECTION, Collection::Projects);
    }

    #[test]
    fn test_prediction_success_is_html() {
        let prediction = Prediction {
            id: "r1".to_string(),
            projkey: "p1".to_string(),
            name: "pred".to_string(),
            model_type: "RFC".to_string(),
            model_name: "fs".to_string(),
            created: Utc::now(),
            filename: "ts.dat".to_string(),
            results_str_html: Some("<table></table>".to_string()),
            features_dict: None,
            ts_data_dict: None,
            pred_results_list_dict: None,
            pid: None,
            err_msg: None,
        };
        assert_eq!(prediction.stage(), JobStage::Succeeded);
        assert_eq!(Prediction::JOB_KIND, JobKind::Prediction);
    }
}
