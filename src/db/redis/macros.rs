/// Returns a cached value for `$key`, or evaluates `$block`, caches its result for
/// `$ttl` seconds and returns it.
///
/// The cache must provide `get_from_cache` and `set_in_background`. A failed cache
/// read is logged and treated as a miss, so `$block` still runs when Redis is
/// unreachable. Errors from `$block` are propagated with `?`; a failed `$block` is
/// never cached.
///
/// # Example
/// ```rust,ignore
/// let suggestions: Vec<String> = cached!(cache, key, 3600, async move {
///     fetch_suggestions().await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let hit = match $cache.get_from_cache(&$key).await {
            Ok(hit) => hit,
            Err(e) => {
                ::tracing::warn!(error = %e, key = %$key, "Cache read failed, computing value");
                None
            }
        };
        match hit {
            Some(cached) => Ok(cached),
            None => {
                let value = $block.await?;
                $cache.set_in_background(&$key, &value, $ttl);
                Ok(value)
            }
        }
    }};
}
