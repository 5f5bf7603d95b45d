//! Transform stage contract

use crate::containers::Data;
use crate::error::EtlError;

use eyre::Result;

/// Transform stage of a [`TemplatePipeline`](super::TemplatePipeline)
///
/// Implementors declare the datasets they expect in
/// [`required_inputs`](Self::required_inputs) and write the transformation
/// as small steps that replace named entries of the [`Data`] they are handed.
/// `run` checks the inputs before any step executes.
///
/// # Example
/// ```
/// use etlkit::etl::TransformTemplate;
/// use etlkit::{Data, Table};
/// use eyre::Result;
///
/// struct LatestOpps;
///
/// impl TransformTemplate for LatestOpps {
///     type Output = Table;
///
///     fn required_inputs(&self) -> Vec<&str> {
///         vec!["df_opps"]
///     }
///
///     fn transform(&mut self, data: &mut Data) -> Result<Table> {
///         let opps = data.get("df_opps")?.head(10);
///         data.set("df_final", opps);
///         Ok(data.take("df_final")?)
///     }
/// }
///
/// let mut data = Data::new();
/// data.set("df_opps", Table::with_rows(["Id"], vec![vec!["a".into()]])?);
/// let table = LatestOpps.run(data)?;
/// assert_eq!(table.num_rows(), 1);
/// # Ok::<(), eyre::Report>(())
/// ```
pub trait TransformTemplate: Send {
    /// Value handed on to the load stage
    type Output: Send;

    /// Names of the datasets `transform` reads
    fn required_inputs(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Check the incoming datasets before transforming
    ///
    /// The default requires every [`required_inputs`](Self::required_inputs)
    /// dataset to be present and non-empty.
    ///
    /// # Errors
    /// Returns [`EtlError::Validation`] naming the offending dataset
    fn test_inputs(&self, data: &Data) -> Result<(), EtlError> {
        for name in self.required_inputs() {
            let table = data.get(name).map_err(|_| EtlError::Validation {
                dataset: name.to_string(),
                reason: "dataset is missing".to_string(),
            })?;
            if table.is_empty() {
                return Err(EtlError::Validation {
                    dataset: name.to_string(),
                    reason: "dataset is empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Apply the transformation steps, mutating `data` in place
    fn transform(&mut self, data: &mut Data) -> Result<Self::Output>;

    /// Check the transformed result before it is loaded
    fn check_output(&self, _output: &Self::Output) -> Result<()> {
        Ok(())
    }

    /// Validate inputs, then transform
    fn run(&mut self, mut data: Data) -> Result<Self::Output> {
        self.test_inputs(&data)?;
        log::debug!("Inputs validated: {}", data.names().collect::<Vec<_>>().join(", "));
        self.transform(&mut data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::Table;
    use serde_json::json;

    struct CountRows {
        ran: bool,
    }

    impl TransformTemplate for CountRows {
        type Output = usize;

        fn required_inputs(&self) -> Vec<&str> {
            vec!["df_opps", "df_fh"]
        }

        fn transform(&mut self, data: &mut Data) -> Result<usize> {
            self.ran = true;
            let total = data.get("df_opps")?.num_rows() + data.get("df_fh")?.num_rows();
            Ok(total)
        }
    }

    fn rows(n: usize) -> Table {
        Table::with_rows(["Id"], (0..n).map(|i| vec![json!(i)]).collect()).unwrap()
    }

    #[test]
    fn test_missing_input_fails_before_transform() {
        let mut data = Data::new();
        data.set("df_fh", rows(5));

        let mut stage = CountRows { ran: false };
        let err = stage.run(data).unwrap_err();

        let validation = err.downcast_ref::<EtlError>().unwrap();
        assert!(matches!(
            validation,
            EtlError::Validation { dataset, .. } if dataset == "df_opps"
        ));
        assert!(!stage.ran);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let mut data = Data::new();
        data.set("df_opps", rows(0));
        data.set("df_fh", rows(2));

        let err = CountRows { ran: false }.test_inputs(&data).unwrap_err();
        assert!(err.to_string().contains("empty"));
        assert_eq!(err.subject(), Some("df_opps"));
    }

    #[test]
    fn test_run_transforms_valid_inputs() {
        let mut data = Data::new();
        data.set("df_opps", rows(3));
        data.set("df_fh", rows(5));

        let mut stage = CountRows { ran: false };
        assert_eq!(stage.run(data).unwrap(), 8);
        assert!(stage.ran);
    }
}
