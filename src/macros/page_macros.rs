/// Fetch pages with a shared lock for `$txn` and bind read guards for the body.
/// Must be used inside a function returning `DbResult`.
#[macro_export]
macro_rules! with_read_pages {
    ($pool:expr, $txn:expr, [ $( ($id:expr, $var:ident) ),+ ], $body:block ) => {{
        paste! {{
            $(
                let [<pg_$var>] = $pool.get_page($txn, $id, $crate::types::Permission::ReadOnly)?;
                let $var = [<pg_$var>].read()?;
            )+

            { $body }
        }}
    }};
}

/// Fetch pages with an exclusive lock for `$txn` and bind write guards for the body.
/// Every page is marked dirty by `$txn` once the body completes.
#[macro_export]
macro_rules! with_write_pages {
    ($pool:expr, $txn:expr, [ $( ($id:expr, $var:ident) ),+ ], $body:block ) => {{
        paste! {{
            $(
                let [<pg_$var>] = $pool.get_page($txn, $id, $crate::types::Permission::ReadWrite)?;
                #[allow(unused_mut)]
                let mut $var = [<pg_$var>].write()?;
            )+

            let result = { $body };

            $(
                $crate::storage::page::page::Page::mark_dirty(&mut *$var, true, $txn);
                drop($var);    // explicit drop is required to unpin page
            )+
            result
        }}
    }};
}
