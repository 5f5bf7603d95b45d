//! Pipeline orchestration for ETL runs

use super::{ExtractTemplate, LoadTemplate, NoLoad, TransformTemplate};
use crate::containers::Config;

use eyre::{Result, WrapErr};
use std::sync::Arc;

/// Builds a fresh stage instance from the run configuration
pub type StageFactory<S> = Box<dyn Fn(Arc<Config>) -> Result<S> + Send + Sync>;

/// Extract → Transform → (optional) Load pipeline
///
/// Stages are bound as factories and instantiated anew on every
/// [`run`](Self::run), each receiving the shared [`Config`].
///
/// # Type Parameters
/// - `E`: extract stage
/// - `T`: transform stage
/// - `L`: load stage, [`NoLoad`] until one is bound with [`with_load`](Self::with_load)
///
/// # Example
/// ```no_run
/// use etlkit::etl::{ExtractTemplate, MultiExtractor, TemplatePipeline, TransformTemplate};
/// use etlkit::{Config, Data};
/// use eyre::Result;
///
/// struct Extract;
///
/// impl ExtractTemplate for Extract {
///     async fn run(&mut self) -> Result<Data> {
///         Ok(MultiExtractor::concurrent().run().await?)
///     }
/// }
///
/// struct Passthrough;
///
/// impl TransformTemplate for Passthrough {
///     type Output = Data;
///
///     fn transform(&mut self, data: &mut Data) -> Result<Data> {
///         Ok(std::mem::take(data))
///     }
/// }
///
/// # async fn example() -> Result<()> {
/// let config = Config::builder().table_name("accounts").build()?;
/// let pipeline = TemplatePipeline::new(config, |_| Ok(Extract), |_| Ok(Passthrough));
///
/// let data = pipeline.run().await?;
/// println!("{data}");
/// # Ok(())
/// # }
/// ```
pub struct TemplatePipeline<E, T, L = NoLoad> {
    config: Arc<Config>,
    extract: StageFactory<E>,
    transform: StageFactory<T>,
    load: Option<StageFactory<L>>,
}

impl<E, T> TemplatePipeline<E, T, NoLoad>
where
    E: ExtractTemplate,
    T: TransformTemplate,
{
    /// Create a pipeline with an extract and a transform stage
    pub fn new(
        config: Config,
        extract: impl Fn(Arc<Config>) -> Result<E> + Send + Sync + 'static,
        transform: impl Fn(Arc<Config>) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            config: Arc::new(config),
            extract: Box::new(extract),
            transform: Box::new(transform),
            load: None,
        }
    }

    /// Bind a load stage
    pub fn with_load<L>(
        self,
        load: impl Fn(Arc<Config>) -> Result<L> + Send + Sync + 'static,
    ) -> TemplatePipeline<E, T, L>
    where
        L: LoadTemplate<T::Output>,
        T::Output: Sync,
    {
        TemplatePipeline {
            config: self.config,
            extract: self.extract,
            transform: self.transform,
            load: Some(Box::new(load)),
        }
    }
}

impl<E, T, L> TemplatePipeline<E, T, L>
where
    E: ExtractTemplate,
    T: TransformTemplate,
    T::Output: Sync,
    L: LoadTemplate<T::Output>,
{
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a load stage is bound
    pub fn has_load(&self) -> bool {
        self.load.is_some()
    }

    /// Run the complete pipeline
    ///
    /// Steps:
    /// 1. Build the extract stage and run it
    /// 2. Build the transform stage and run it on the extracted data
    /// 3. If bound, build the load stage and load the transform result
    ///
    /// Returns the transform result
    ///
    /// # Errors
    /// The first failing stage aborts the run; later stages are not invoked
    pub async fn run(&self) -> Result<T::Output> {
        log::info!("Starting ETL pipeline");

        // Extract
        log::debug!("Extracting...");
        let mut extract =
            (self.extract)(Arc::clone(&self.config)).wrap_err("Failed to build extract stage")?;
        let data = extract.run().await.wrap_err("Extract stage failed")?;
        log::info!("Extracted {} dataset(s)", data.len());

        // Transform
        log::debug!("Transforming...");
        let mut transform = (self.transform)(Arc::clone(&self.config))
            .wrap_err("Failed to build transform stage")?;
        let result = transform.run(data).wrap_err("Transform stage failed")?;
        transform
            .check_output(&result)
            .wrap_err("Transform output failed checks")?;
        log::info!("Transform complete");

        // Load
        match &self.load {
            Some(factory) => {
                log::debug!("Loading...");
                let mut load =
                    factory(Arc::clone(&self.config)).wrap_err("Failed to build load stage")?;
                load.run(&result, &self.config)
                    .await
                    .wrap_err("Load stage failed")?;
                log::info!("Load complete");
            }
            None => log::info!("No load stage bound, skipping load"),
        }

        Ok(result)
    }
}
