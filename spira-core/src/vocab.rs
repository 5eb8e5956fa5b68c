//! IRIs of the vocabularies the core needs to know about.

pub mod rdf {
    use crate::term::Iri;

    pub const NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

    pub fn type_() -> Iri {
        Iri::from_static("http://www.w3.org/1999/02/22-rdf-syntax-ns#type")
    }

    pub fn lang_string() -> Iri {
        Iri::from_static("http://www.w3.org/1999/02/22-rdf-syntax-ns#langString")
    }
}

pub mod xsd {
    use crate::term::Iri;

    pub const NS: &str = "http://www.w3.org/2001/XMLSchema#";

    macro_rules! xsd_terms {
        ($($fn_name:ident => $local:literal),* $(,)?) => {
            $(
                pub fn $fn_name() -> Iri {
                    Iri::from_static(concat!("http://www.w3.org/2001/XMLSchema#", $local))
                }
            )*
        };
    }

    xsd_terms! {
        string => "string",
        boolean => "boolean",
        integer => "integer",
        long => "long",
        int => "int",
        non_negative_integer => "nonNegativeInteger",
        non_positive_integer => "nonPositiveInteger",
        positive_integer => "positiveInteger",
        negative_integer => "negativeInteger",
        double => "double",
        float => "float",
        decimal => "decimal",
        date => "date",
        date_time => "dateTime",
        time => "time",
        any_uri => "anyURI",
    }
}
