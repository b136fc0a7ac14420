macro_rules! define_atoms {
    ($($name:ident,)+) => {
        /// Atoms interned once per connection.
        #[allow(non_snake_case)]
        #[derive(Clone, Copy, Debug, PartialEq, Eq)]
        pub struct Atoms<Atom> {
            $(
                pub $name: Atom,
            )+
        }

        impl<Atom> Atoms<Atom> {
            pub fn new<E, F>(mut f: F) -> Result<Self, E>
            where
                F: FnMut(&'static str) -> Result<Atom, E>,
            {
                Ok(Self {
                    $(
                        $name: f(stringify!($name))?,
                    )+
                })
            }

            /// Same as [`Atoms::new`] but the names carry a trailing NUL for C APIs.
            pub fn new_null<E, F>(mut f: F) -> Result<Self, E>
            where
                F: FnMut(&'static str) -> Result<Atom, E>,
            {
                Ok(Self {
                    $(
                        $name: f(concat!(stringify!($name), "\0"))?,
                    )+
                })
            }
        }
    };
}

define_atoms! {
    WM_PROTOCOLS,
    WM_DELETE_WINDOW,
    _NET_WM_NAME,
    UTF8_STRING,
}

#[cfg(test)]
mod tests {
    use super::Atoms;
    use pretty_assertions::assert_eq;

    #[test]
    fn interns_in_order() {
        let mut names = Vec::new();
        let atoms = Atoms::new::<(), _>(|name| {
            names.push(name);
            Ok(names.len() as u32)
        })
        .unwrap();

        assert_eq!(
            names,
            ["WM_PROTOCOLS", "WM_DELETE_WINDOW", "_NET_WM_NAME", "UTF8_STRING"]
        );
        assert_eq!(atoms.WM_PROTOCOLS, 1);
        assert_eq!(atoms.UTF8_STRING, 4);
    }

    #[test]
    fn null_terminated_names() {
        let atoms = Atoms::new_null::<(), _>(|name| Ok(name)).unwrap();
        assert_eq!(atoms.WM_DELETE_WINDOW, "WM_DELETE_WINDOW\0");
        assert_eq!(atoms._NET_WM_NAME, "_NET_WM_NAME\0");
    }

    #[test]
    fn first_failure_stops() {
        let mut calls = 0;
        let err = Atoms::<u32>::new(|name| {
            calls += 1;
            if name == "WM_DELETE_WINDOW" {
                Err(name)
            } else {
                Ok(1)
            }
        })
        .unwrap_err();

        assert_eq!(err, "WM_DELETE_WINDOW");
        assert_eq!(calls, 2);
    }
}
