/// Allows various return types to be turned into the result a dispatch captures.
///
/// Computations may return `anyhow::Result<Z>` (or any `Result` whose error converts
/// into `anyhow::Error`), `()` for procedures, or a plain value of common types which
/// always counts as success. Plain values are limited to primitives, `String`,
/// `&'static str`, `Vec<T>`, `Option<T>` and tuples of two to four elements; anything
/// else (maps, boxes, own structs) has to be returned as `Ok(value)`.
///
/// ```rust
/// fn procedure() {}
///
/// fn fallible() -> anyhow::Result<u32> {
///     Ok(1)
/// }
///
/// fn plain() -> String {
///     "hello".into()
/// }
/// ```
pub trait IntoResult<Z> {
    fn into_result(self) -> anyhow::Result<Z>;
}

/// Procedures have no meaningful value, their outcome only tells if they failed.
impl IntoResult<()> for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<Z, E> IntoResult<Z> for Result<Z, E>
where
    E: Into<anyhow::Error>,
{
    fn into_result(self) -> anyhow::Result<Z> {
        self.map_err(Into::into)
    }
}

/// Macro for infallible IntoResult implementations.
macro_rules! derive_infallible {
    ($($type:ty),* $(,)?) => {
        $(
            impl IntoResult<$type> for $type {
                fn into_result(self) -> anyhow::Result<$type> {
                    Ok(self)
                }
            }
        )*
    };
}

derive_infallible!(
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    String,
    &'static str,
);

impl<T> IntoResult<Vec<T>> for Vec<T> {
    fn into_result(self) -> anyhow::Result<Vec<T>> {
        Ok(self)
    }
}

impl<T> IntoResult<Option<T>> for Option<T> {
    fn into_result(self) -> anyhow::Result<Option<T>> {
        Ok(self)
    }
}

/// Macro for infallible IntoResult implementations over tuples.
macro_rules! derive_infallible_tuple {
    ($(($($ty:ident),+)),* $(,)?) => {
        $(
            impl<$($ty,)+> IntoResult<($($ty,)+)> for ($($ty,)+) {
                fn into_result(self) -> anyhow::Result<($($ty,)+)> {
                    Ok(self)
                }
            }
        )*
    };
}

derive_infallible_tuple!((A, B), (A, B, C), (A, B, C, D));

/// Caller-supplied work that a dispatcher runs exactly once on a worker.
///
/// `Args` is the tuple of inputs (`()` for none, `(A,)` for one and so on up to five).
/// Implemented for every `FnOnce` closure or function of matching arity whose return
/// type implements [`IntoResult`], so callers never implement it by hand.
///
/// Procedures have no slot for extra trailing values, a value they need besides
/// their inputs is moved into the closure:
///
/// ```rust
/// use dispatch_core::Computation;
///
/// let seed = 10_u32;
/// let procedure = move |a: u32| assert_eq!(a + seed, 11);
/// procedure.invoke((1,)).unwrap();
/// ```
pub trait Computation<Args, Z>: Send + 'static {
    /// Consumes the computation, forwarding `args` in order.
    fn invoke(self, args: Args) -> anyhow::Result<Z>;
}

macro_rules! implement_computation {
    ($($ty:ident),*) => {
        #[allow(non_snake_case)]
        impl<F, R, Z, $($ty,)*> Computation<($($ty,)*), Z> for F
        where
            R: IntoResult<Z>,
            F: FnOnce($($ty),*) -> R + Send + 'static,
        {
            fn invoke(self, ($($ty,)*): ($($ty,)*)) -> anyhow::Result<Z> {
                self($($ty),*).into_result()
            }
        }
    };
}

implement_computation!();
implement_computation!(T1);
implement_computation!(T1, T2);
implement_computation!(T1, T2, T3);
implement_computation!(T1, T2, T3, T4);
implement_computation!(T1, T2, T3, T4, T5);
