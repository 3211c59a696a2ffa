use model::core::value::{DateTimeValue, TimeValue, Value};
use mysql_async::{Params, Value as MySqlValue};

pub struct MySqlParam(MySqlValue);

impl MySqlParam {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => MySqlParam(MySqlValue::NULL),
            Value::Int(i) => MySqlParam(MySqlValue::Int(*i)),
            Value::Uint(u) => MySqlParam(MySqlValue::UInt(*u)),
            Value::Float(f) => MySqlParam(MySqlValue::Float(*f)),
            Value::Double(d) => MySqlParam(MySqlValue::Double(*d)),
            Value::Bytes(b) => MySqlParam(MySqlValue::Bytes(b.clone())),
            Value::DateTime(dt) => MySqlParam(MySqlValue::Date(
                dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second, dt.micros,
            )),
            Value::Time(t) => MySqlParam(MySqlValue::Time(
                t.negative, t.days, t.hours, t.minutes, t.seconds, t.micros,
            )),
        }
    }

    pub fn into_inner(self) -> MySqlValue {
        self.0
    }
}

pub struct MySqlParamStore {
    pub params: Vec<MySqlParam>,
}

impl MySqlParamStore {
    pub fn from_values(values: &[Value]) -> Self {
        let params = values.iter().map(MySqlParam::from_value).collect();
        MySqlParamStore { params }
    }

    pub fn params(self) -> Params {
        if self.params.is_empty() {
            return Params::Empty;
        }
        Params::Positional(self.params.into_iter().map(MySqlParam::into_inner).collect())
    }
}

/// Converts a driver value into the archiver's value model without loss.
pub fn value_from_mysql(value: MySqlValue) -> Value {
    match value {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Int(i) => Value::Int(i),
        MySqlValue::UInt(u) => Value::Uint(u),
        MySqlValue::Float(f) => Value::Float(f),
        MySqlValue::Double(d) => Value::Double(d),
        MySqlValue::Bytes(b) => Value::Bytes(b),
        MySqlValue::Date(year, month, day, hour, minute, second, micros) => {
            Value::DateTime(DateTimeValue {
                year,
                month,
                day,
                hour,
                minute,
                second,
                micros,
            })
        }
        MySqlValue::Time(negative, days, hours, minutes, seconds, micros) => {
            Value::Time(TimeValue {
                negative,
                days,
                hours,
                minutes,
                seconds,
                micros,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_values_round_trip() {
        let originals = vec![
            MySqlValue::NULL,
            MySqlValue::Int(-5),
            MySqlValue::UInt(u64::MAX),
            MySqlValue::Double(1.5),
            MySqlValue::Bytes(b"abc".to_vec()),
            MySqlValue::Date(2024, 1, 2, 3, 4, 5, 6),
            MySqlValue::Time(true, 2, 1, 0, 59, 10),
        ];

        for original in originals {
            let value = value_from_mysql(original.clone());
            assert_eq!(MySqlParam::from_value(&value).into_inner(), original);
        }
    }

    #[test]
    fn no_values_bind_as_empty_params() {
        assert_eq!(MySqlParamStore::from_values(&[]).params(), Params::Empty);
    }
}
