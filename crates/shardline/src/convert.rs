/// A conversion applied by every worker to every input.
///
/// The same converter is shared by all workers and invoked concurrently from
/// each of their threads. It must not mutate shared state without its own
/// synchronization, and it is expected to terminate.
///
/// Any `Fn(I) -> O` closure that is `Send + Sync + 'static` is a converter.
///
/// # Example
/// ```
/// use shardline::Converter;
///
/// struct Celsius;
/// impl Converter<f64, f64> for Celsius {
///     fn convert(&self, fahrenheit: f64) -> f64 {
///         (fahrenheit - 32.0) * 5.0 / 9.0
///     }
/// }
///
/// assert_eq!(Celsius.convert(212.0), 100.0);
/// assert_eq!((|n: u8| n * 2).convert(21), 42);
/// ```
pub trait Converter<I, O>: Send + Sync + 'static {
    /// Converts one input into one output.
    fn convert(&self, input: I) -> O;
}

impl<I, O, F> Converter<I, O> for F
where
    F: Fn(I) -> O + Send + Sync + 'static,
{
    #[inline]
    fn convert(&self, input: I) -> O {
        self(input)
    }
}
