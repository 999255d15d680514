/// Asserts that at least one element of a vector matches a pattern, optionally with a
/// guard and an expression to run on the match.
///
/// ```ignore
/// assert_vec_contains!(results, ServerSessionResult::RaisedEvent(event) if is_publish(event));
/// ```
macro_rules! assert_vec_contains {
    (@match $vector:expr, $pattern:pat if $cond:expr => $success:expr) => {
        let mut matched = false;
        for x in $vector.iter() {
            #[allow(unused_variables)]
            match x {
                $pattern if $cond => {
                    matched = true;
                    $success
                }

                _ => (),
            };
        }

        if !matched {
            panic!(
                "None of the {} elements matched '{} if {}': {:?}",
                $vector.len(),
                stringify!($pattern),
                stringify!($cond),
                $vector
            )
        }
    };

    ($vector:expr, $pattern:pat if $cond:expr) => {
        assert_vec_contains!(@match $vector, $pattern if $cond => ());
    };

    ($vector:expr, $pattern:pat => $success:expr) => {
        assert_vec_contains!(@match $vector, $pattern if true => $success);
    };

    ($vector:expr, $pattern:pat if $cond:expr => $success:expr) => {
        assert_vec_contains!(@match $vector, $pattern if $cond => $success);
    };

    ($vector:expr, $pattern:pat) => {
        assert_vec_contains!(@match $vector, $pattern if true => ());
    };
}
