mod prop_compile;
mod prop_criteria_json;
